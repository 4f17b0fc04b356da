//! Server Module Tests
//!
//! The route table itself is exercised end to end by the cluster tests in the
//! membership module; these cover the bind loop.

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use tokio::net::TcpListener;

    use crate::server::bind_with_retry;

    #[tokio::test]
    async fn test_bind_retry_skips_taken_port() {
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        let taken = TcpListener::bind((host, 0)).await.unwrap();
        let base_port = taken.local_addr().unwrap().port();

        let listener = bind_with_retry(host, base_port).await.unwrap();
        let bound = u32::from(listener.local_addr().unwrap().port());
        assert!(bound > u32::from(base_port));
        assert!(bound <= u32::from(base_port) + 16);
    }

    #[tokio::test]
    async fn test_bind_retry_stops_at_port_ceiling() {
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        // Hold the last port so the loop has nowhere left to go. If another
        // process holds it already, the retry sees the same picture.
        let _guard = TcpListener::bind((host, u16::MAX)).await;

        let result = bind_with_retry(host, u16::MAX).await;
        assert!(result.is_err());
    }
}
