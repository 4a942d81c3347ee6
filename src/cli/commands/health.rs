use anyhow::Context;

pub async fn handle(base_url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    println!("{} -> {} {}", url, status, body);

    if !status.is_success() {
        anyhow::bail!("server reported {}", status);
    }
    Ok(())
}
