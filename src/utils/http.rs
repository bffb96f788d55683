use once_cell::sync::Lazy;
use reqwest::Client;

// No client-wide timeout: callers pass their own per request when configured.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
