fn main() {
    // ESP-IDF environment is only needed for the Xtensa firmware build; host
    // builds (tests, host-node) skip it.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
