use hyper::Method;

#[derive(Debug, PartialEq)]
pub enum Route {
    Healthz,
    Metrics,
    Gate,
}

impl Route {
    pub fn action_name(&self) -> &'static str {
        match self {
            Route::Healthz => "healthz",
            Route::Metrics => "metrics",
            Route::Gate => "gate",
        }
    }
}

pub fn parse(method: &Method, path: &str) -> Route {
    match path {
        "/healthz" if method == Method::GET => Route::Healthz,
        "/metrics" if method == Method::GET => Route::Metrics,
        _ => Route::Gate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operational_routes() {
        assert_eq!(parse(&Method::GET, "/healthz"), Route::Healthz);
        assert_eq!(parse(&Method::GET, "/metrics"), Route::Metrics);
    }

    #[test]
    fn test_everything_else_goes_through_the_gate() {
        assert_eq!(parse(&Method::POST, "/healthz"), Route::Gate);
        assert_eq!(parse(&Method::GET, "/metrics/extra"), Route::Gate);
        assert_eq!(parse(&Method::GET, "/api/invoice/1"), Route::Gate);
        assert_eq!(parse(&Method::DELETE, "/"), Route::Gate);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Route::Healthz.action_name(), "healthz");
        assert_eq!(Route::Metrics.action_name(), "metrics");
        assert_eq!(Route::Gate.action_name(), "gate");
    }
}
