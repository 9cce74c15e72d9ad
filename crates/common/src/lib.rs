pub mod types;
pub mod utils;
pub mod env;
pub mod admin_http;
pub mod tasks;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { status: "ok", version: "0.1.0" };
        assert_eq!(h.status, "ok");
    }
}
