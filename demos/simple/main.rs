use std::collections::HashMap;

use optimizely::{Client, ClientConfig, Event};

pub fn main() {
    env_logger::init();

    let path = std::env::var("OPTIMIZELY_DATAFILE")
        .unwrap_or_else(|_| "tests/data/valid-project-config.json".to_owned());
    let datafile = std::fs::read_to_string(&path).unwrap();

    let mut config = ClientConfig::new(datafile);
    config.event_dispatcher = Box::new(|event: Event| {
        println!("Event: {}", serde_json::to_string(&event).unwrap());
    });
    config.deduplicate_impressions = true;
    let client = Client::new(config).unwrap();

    let attributes = HashMap::from([("browser_type".to_owned(), "chrome".to_owned())]);

    for user_id in ["user1", "user2", "user3", "testUser1"] {
        let variation = client
            .activate("etag1", user_id, &attributes)
            .unwrap()
            .map(|variation| variation.key)
            // default experience
            .unwrap_or_else(|| "control".to_owned());

        println!("{user_id}: {variation}");
    }

    client
        .track("clicked_purchase", "user1", &attributes, Some(100))
        .unwrap();
}
