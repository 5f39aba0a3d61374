use bytes::Bytes;
use clap::Parser;
use forma_http::body::body_to_bytes;
use http::Method;

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::Result;

#[derive(Debug, Parser)]
pub struct Request {
    /// HTTP method, e.g. GET or POST
    #[arg(value_parser = parse_method)]
    method: Method,

    /// Path relative to the API base URL, e.g. /projects
    path: String,

    /// JSON request body
    #[arg(long, value_parser = parse_json_body)]
    body: Option<String>,
}

impl Request {
    pub async fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        let client = forma.client()?;
        let body = self.body.clone().map(Bytes::from);
        let req = client.request(self.method.clone(), &self.path, body)?;
        tracing::debug!(method = %self.method, path = %self.path, "sending request");

        let mut res = client.issue(req).await?;
        let status = res.status().as_u16();
        let body = body_to_bytes(res.body_mut()).await?;
        Ok(FormaOutput::Response {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn parse_method(method: &str) -> std::result::Result<Method, String> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("'{method}' is not an HTTP method"))
}

fn parse_json_body(body: &str) -> std::result::Result<String, String> {
    serde_json::from_str::<serde_json::Value>(body)
        .map(|_| body.to_string())
        .map_err(|err| format!("the body is not valid JSON: {err}"))
}
