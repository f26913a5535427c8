fn main() {
    // 仅在 ESP-IDF 目标上输出 esp-idf-sys 的链接参数
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
