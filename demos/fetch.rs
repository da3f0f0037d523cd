use http_facade::{helpers, Call, Service};

fn main() {
    // init logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://httpbin.org/get".to_string());

    match helpers::get(&url, "", Call::new().param("from", "demo")) {
        Ok(envelope) => {
            log::info!("status_line = {}", envelope.response_headers.status_line());
            log::info!("info = {:?}", envelope.info);
            log::info!("body = {:?}", envelope.body);
        }
        Err(failure) => log::error!("request failed: {failure}"),
    }

    let mut service = Service::new("https://httpbin.org");
    service.just_response(false);
    match service.post("/post", Call::new().header("Content-Type", "application/json").data(r#"{"hello":"world"}"#)) {
        Ok(reply) => log::info!("reply = {reply:?}"),
        Err(failure) => log::error!("post failed: {failure}"),
    }
}
