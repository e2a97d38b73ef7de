use std::time::Duration;

use anyhow::{Context, bail};

use crate::normalize::SignInBatch;

const TOKEN_SCOPE: &str = "https://graph.microsoft.com/.default";
const SIGNINS_URL: &str = "https://graph.microsoft.com/v1.0/auditLogs/signIns";

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}

/// OAuth2 client-credentials grant against Entra ID. Returns the bearer
/// token string or a diagnostic covering the usual failure shapes (network,
/// non-JSON body, rejected credentials).
pub fn get_access_token(tenant_id: &str, client_id: &str, client_secret: &str) -> anyhow::Result<String> {
    let url = format!("https://login.microsoftonline.com/{}/oauth2/v2.0/token", tenant_id);
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("scope", TOKEN_SCOPE),
    ];
    let resp = http_client().post(&url).form(&params).send().context("token request failed")?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().context("token response was not JSON")?;
    match body.get("access_token").and_then(|v| v.as_str()) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => {
            let detail = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .map(|d| d.lines().next().unwrap_or(d).to_string())
                .unwrap_or_else(|| "no access_token in response".to_string());
            bail!("token endpoint returned HTTP {}: {}", status, detail)
        }
    }
}

/// Authenticated pull of the sign-in batch. One page is enough for triage;
/// paging via `@odata.nextLink` is out of scope here.
pub fn fetch_signin_logs(token: &str) -> anyhow::Result<SignInBatch> {
    let resp = http_client()
        .get(SIGNINS_URL)
        .bearer_auth(token)
        .send()
        .context("sign-in log request failed")?;
    let status = resp.status();
    if !status.is_success() {
        bail!("sign-in log endpoint returned HTTP {}", status);
    }
    resp.json::<SignInBatch>().context("sign-in log response was not in the expected shape")
}
