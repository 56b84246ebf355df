use std::time::Duration;

use featureboard::{ClientConfig, UpdateStrategy};

pub fn main() -> featureboard::Result<()> {
    env_logger::init();

    let api_key = std::env::var("FEATUREBOARD_API_KEY").unwrap_or_default();
    let strategy = match std::env::var("FEATUREBOARD_UPDATE_STRATEGY") {
        Ok(name) => name.parse()?,
        Err(_) => UpdateStrategy::Polling,
    };

    // Blocks until the first refresh attempt finishes.
    let client = ClientConfig::from_api_key(api_key)
        .update_strategy(strategy)
        .max_age(Duration::from_secs(10))
        .start()?;

    let scope = client.request(["beta-testers"]);
    let enabled = scope.get_bool("new-checkout", false);
    let limit = scope.get_number("upload-limit-mb", 10.0);

    println!("new-checkout: {:?}, upload-limit-mb: {:?}", enabled, limit);

    client.shutdown()
}
