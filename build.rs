fn main() {
    // Host builds (simulation + tests) have no ESP-IDF environment to forward.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
