use actix_web::HttpRequest;
use log::debug;

/// 代理头的检查顺序，固定不可调换，它决定了代理链后面的封禁是否打在正确的地址上
const FORWARD_HEADERS: [&str; 5] = [
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "HTTP_CLIENT_IP",
    "HTTP_X_FORWARDED_FOR",
];

/// 解析请求的真实客户端地址
///
/// 依次检查转发头，取第一个非空且不为 "unknown" 的值；
/// 全部不可用时退回 socket 对端地址。
pub fn resolve_client_ip(req: &HttpRequest) -> String {
    for name in FORWARD_HEADERS {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() && !value.eq_ignore_ascii_case("unknown") {
                debug!("客户端地址取自 {} 头: {}", name, value);
                return value.to_string();
            }
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 请求的 User-Agent，缺失时记为 unknown
pub fn resolve_user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    #[test]
    fn unknown_forwarded_for_falls_through_to_proxy_client_ip() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "unknown"))
            .insert_header(("Proxy-Client-IP", "203.0.113.5"))
            .to_http_request();

        assert_eq!(resolve_client_ip(&req), "203.0.113.5");
    }

    #[test]
    fn first_header_wins_when_present() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "198.51.100.7"))
            .insert_header(("Proxy-Client-IP", "203.0.113.5"))
            .to_http_request();

        assert_eq!(resolve_client_ip(&req), "198.51.100.7");
    }

    #[test]
    fn case_insensitive_unknown_and_blank_are_skipped() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "UNKNOWN"))
            .insert_header(("Proxy-Client-IP", "  "))
            .insert_header(("WL-Proxy-Client-IP", "203.0.113.9"))
            .to_http_request();

        assert_eq!(resolve_client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)), 40000);
        let req = TestRequest::default().peer_addr(peer).to_http_request();

        assert_eq!(resolve_client_ip(&req), "192.0.2.10");
    }

    #[test]
    fn user_agent_defaults_to_unknown() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(resolve_user_agent(&req), "unknown");

        let req = TestRequest::default()
            .insert_header(("User-Agent", "curl/8.0"))
            .to_http_request();
        assert_eq!(resolve_user_agent(&req), "curl/8.0");
    }
}
