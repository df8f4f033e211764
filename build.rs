fn main() {
    for var in [
        "WIFI_SSID",
        "WIFI_PASS",
        "MQTT_HOST",
        "MQTT_PORT",
        "MQTT_USER",
        "MQTT_PASS",
        "MQTT_PREFIX",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Host builds (tests, tooling) have no ESP-IDF environment to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
