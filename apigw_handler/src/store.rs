use crate::{Config, HandlerError, Record};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_dynamodb as ddb;
use aws_sdk_dynamodb::model::AttributeValue;
use std::collections::HashMap;

/// Destination for records. One write per call, never retried.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_record(&self, table_name: &str, record: &Record) -> Result<(), HandlerError>;
}

/// Holds one DynamoDB client for the life of the process.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: ddb::Client,
}

impl DynamoDbStore {
    pub fn new(client: ddb::Client) -> DynamoDbStore {
        DynamoDbStore { client }
    }

    pub async fn from_config(config: &Config) -> DynamoDbStore {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let sdk_config = aws_config::from_env().region(region_provider).load().await;
        let ddb_config = match &config.dynamodb_endpoint {
            Some(endpoint) => ddb::config::Builder::from(&sdk_config)
                .endpoint_url(endpoint)
                .build(),
            None => ddb::config::Builder::from(&sdk_config).build()
        };
        DynamoDbStore::new(ddb::Client::from_conf(ddb_config))
    }
}

fn record_item(record: &Record) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (String::from("year"), AttributeValue::N(record.year.to_owned())),
        (String::from("title"), AttributeValue::S(record.title.to_owned())),
        (String::from("id"), AttributeValue::S(record.id.to_owned()))
    ])
}

#[async_trait]
impl RecordStore for DynamoDbStore {
    async fn put_record(&self, table_name: &str, record: &Record) -> Result<(), HandlerError> {
        self.client.put_item()
            .set_table_name(Some(table_name.to_owned()))
            .set_item(Some(record_item(record)))
            .send()
            .await
            .map_err(|e| HandlerError::Storage(Box::new(e)))?;
        Ok(())
    }
}

#[test]
fn test_record_item_tags() {
    let item = record_item(&Record {
        id: String::from("42"),
        title: String::from("Inception"),
        year: String::from("2010")
    });
    assert_eq!(item.len(), 3);
    assert_eq!(item.get("year"), Some(&AttributeValue::N(String::from("2010"))));
    assert_eq!(item.get("title"), Some(&AttributeValue::S(String::from("Inception"))));
    assert_eq!(item.get("id"), Some(&AttributeValue::S(String::from("42"))));
}
