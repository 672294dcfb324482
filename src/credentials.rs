// Auto-generiert aus credentials.toml (siehe build.rs)
include!(concat!(env!("OUT_DIR"), "/credentials.rs"));
