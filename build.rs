fn main() {
    // Device builds target the Xtensa ESP32-S3 and need the ESP-IDF environment;
    // host builds and tests skip it.
    let xtensa = std::env::var("TARGET").is_ok_and(|target| target.contains("xtensa"));
    if xtensa && std::env::var_os("CARGO_FEATURE_ESP32").is_some() {
        embuild::espidf::sysenv::output();
    }
}
