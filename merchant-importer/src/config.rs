use books_common::config::{AwsConfig, NonEmptyString};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    /// CSV file with one merchant listing per row.
    #[envconfig(from = "IMPORT_FILE", default = "./resources/import-data.csv")]
    pub import_file: String,

    #[envconfig(from = "VALIDATOR_QUEUE_URL")]
    pub validator_queue_url: NonEmptyString,

    #[envconfig(nested = true)]
    pub aws: AwsConfig,
}
