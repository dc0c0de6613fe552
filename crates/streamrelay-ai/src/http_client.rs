use reqwest::Client;

use crate::error::Result;

const DISABLE_SYSTEM_PROXY_ENV: &str = "STREAMRELAY_DISABLE_SYSTEM_PROXY";

pub(crate) fn build_http_client() -> Result<Client> {
    let builder = Client::builder();
    let builder = if should_disable_system_proxy() {
        builder.no_proxy()
    } else {
        builder
    };
    Ok(builder.build()?)
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
