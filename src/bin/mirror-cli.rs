use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mirror-cli")]
#[command(about = "Send a request to an http-mirror endpoint and print the report", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000/mirror")]
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Raw request body.
    #[arg(short, long, conflicts_with = "form")]
    data: Option<String>,

    /// Send the body as `application/json`.
    #[arg(long)]
    json: bool,

    /// URL-encoded form field, `name=value`. Repeatable.
    #[arg(short, long)]
    form: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let mut headers = HeaderMap::new();
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("invalid header `{}`, expected `Name: value`", header))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    if cli.json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let mut request = client.request(method, &cli.url).headers(headers);
    if !cli.form.is_empty() {
        let mut fields = Vec::new();
        for field in &cli.form {
            let (name, value) = field
                .split_once('=')
                .ok_or_else(|| format!("invalid form field `{}`, expected `name=value`", field))?;
            fields.push((name.to_string(), value.to_string()));
        }
        request = request.form(&fields);
    } else if let Some(data) = cli.data {
        request = request.body(data);
    }

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: mirror returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
