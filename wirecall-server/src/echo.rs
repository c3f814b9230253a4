//! Built-in `echo` service.

use crate::service::Service;
use std::convert::Infallible;

/// Name the echo service is registered under.
pub const ECHO_SERVICE: &str = "echo";

/// A service with a single method, `Echo(message: String) -> String`.
pub fn echo_service() -> Service {
    Service::new().method("Echo", |message: String| async move {
        Ok::<_, Infallible>(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceMap;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo() {
        let mut map = ServiceMap::new();
        map.insert(ECHO_SERVICE, echo_service());
        let result = map.dispatch("echo", "Echo", vec![json!("hello")]).await.unwrap();
        assert_eq!(result, json!("hello"));
    }
}
