use std::env;

fn main() {
    let version = env::var("VERSION").unwrap_or(env!("CARGO_PKG_VERSION").to_owned());
    println!("cargo:rustc-env=REELBOX_VERSION={version}");
    println!("cargo:rerun-if-env-changed=VERSION");
}
