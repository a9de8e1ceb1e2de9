use apigw_handler::{
    ApiResponse, Config, DynamoDbStore, Handler, Invocation, RecordStore, RequestAudit, CONTENT_TYPE
};
use lambda_http::request::RequestContext;
use lambda_http::{run, service_fn, Body, Context, Error, Request, Response};
use tracing::warn;

const TRACE_DEBUG: &str = "TRACE_DEBUG";

fn request_audit(event: &Request) -> RequestAudit {
    match event.extensions().get::<RequestContext>() {
        Some(RequestContext::ApiGatewayV1(ctx)) => RequestAudit {
            source_ip: ctx.identity.source_ip.clone(),
            user_agent: ctx.identity.user_agent.clone(),
            http_method: Some(ctx.http_method.to_string())
        },
        Some(RequestContext::ApiGatewayV2(ctx)) => RequestAudit {
            source_ip: ctx.http.source_ip.clone(),
            user_agent: ctx.http.user_agent.clone(),
            http_method: Some(ctx.http.method.to_string())
        },
        _ => RequestAudit {
            source_ip: None,
            user_agent: event.headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            http_method: Some(event.method().to_string())
        }
    }
}

fn invocation(event: &Request) -> Invocation {
    let body = match event.body() {
        Body::Text(s) => Some(s.as_bytes().to_vec()),
        Body::Binary(b) => Some(b.to_owned()),
        Body::Empty => None
    };
    let request_id = event.extensions()
        .get::<Context>()
        .map(|ctx| ctx.request_id.to_owned())
        .unwrap_or_default();
    Invocation {
        body,
        audit: request_audit(event),
        request_id
    }
}

fn into_response(resp: ApiResponse) -> Result<Response<Body>, Error> {
    Ok(
        Response::builder()
            .status(resp.status_code)
            .header("content-type", CONTENT_TYPE)
            .body(resp.body.into())
            .map_err(Box::new)?
    )
}

async fn function_handler<S: RecordStore>(
    handler: &Handler<S>,
    event: Request
) -> Result<Response<Body>, Error> {
    let resp = handler.handle(&invocation(&event)).await;
    into_response(resp)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(match std::env::var(TRACE_DEBUG) {
            Ok(_) => tracing::Level::DEBUG,
            Err(_) => tracing::Level::INFO
        })
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let config = Config::from_env();
    if config.table_name.is_none() {
        warn!(event = "missing_configuration", "TABLE_NAME is not set, every write will fail");
    }
    let store = DynamoDbStore::from_config(&config).await;
    let handler = Handler::new(store, config.table_name);
    let handler = &handler;

    run(service_fn(move |event: Request| async move {
        function_handler(handler, event).await
    })).await
}
