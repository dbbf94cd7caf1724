fn main() {
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    // Host builds (unit/integration tests) need no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
