/// Build-time connectivity candidates, forwarded from `.env` when present.
const FORWARDED_VARS: [&str; 3] = [
    "HAMMER_NODE_NAME",
    "HAMMER_WIFI_NETWORKS",
    "HAMMER_MQTT_BROKERS",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for var in FORWARDED_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Variables already set in the environment win over the .env file.
    if let Ok(iter) = dotenvy::dotenv_iter() {
        for (key, value) in iter.flatten() {
            if FORWARDED_VARS.contains(&key.as_str()) && std::env::var(&key).is_err() {
                println!("cargo:rustc-env={key}={value}");
            }
        }
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
