use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use piecework_http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use piecework_property::{PropertyDefinition, PropertySchema};
use piecework_variables::{CoercionConfig, Coercer, process_inputs, resolve_inputs, zip};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

struct FileServer;

#[async_trait]
impl HttpClient for FileServer {
  async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    if request.url.ends_with("/logo.png") {
      Ok(
        HttpResponse::new(200)
          .with_header("content-type", "image/png")
          .with_body(vec![1, 2, 3]),
      )
    } else {
      Ok(HttpResponse::new(404))
    }
  }
}

fn schema() -> PropertySchema {
  PropertySchema::new()
    .with("email", PropertyDefinition::short_text("Email").required(true))
    .with("amount", PropertyDefinition::number("Amount"))
    .with("subject", PropertyDefinition::short_text("Subject"))
    .with("attachment", PropertyDefinition::file("Attachment"))
}

#[tokio::test]
async fn test_render_coerce_and_zip() {
  let mut upstream = HashMap::new();
  upstream.insert(
    "read_rows".to_string(),
    json!({
      "emails": ["a@x.io", "b@x.io"],
      "amounts": ["10", "12.5"],
      "base": "https://cdn.example.com",
    }),
  );

  let mut inputs = HashMap::new();
  inputs.insert("email".to_string(), "{{ emails }}".to_string());
  inputs.insert("amount".to_string(), "{{ amounts }}".to_string());
  inputs.insert("subject".to_string(), "Invoice".to_string());
  inputs.insert("attachment".to_string(), "{{ base }}/logo.png".to_string());

  let rendered = resolve_inputs("send_invoice", &inputs, &upstream, false).unwrap();
  assert_eq!(rendered["email"], json!(["a@x.io", "b@x.io"]));

  let coercer = Coercer::new(Arc::new(FileServer), CoercionConfig::default());
  let schema = PropertySchema::new()
    .with("email", PropertyDefinition::json("Email").required(true))
    .with("amount", PropertyDefinition::json("Amount"))
    .with("subject", PropertyDefinition::short_text("Subject"))
    .with("attachment", PropertyDefinition::file("Attachment"));

  let processed = process_inputs(&coercer, &schema, &rendered, &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(processed["attachment"]["filename"], json!("logo.png"));
  assert_eq!(processed["attachment"]["data"], json!("AQID"));

  let bags = zip(Value::Object(processed));
  let bags = bags.as_array().unwrap();
  assert_eq!(bags.len(), 2);
  assert_eq!(bags[0]["email"], json!("a@x.io"));
  assert_eq!(bags[1]["amount"], json!("12.5"));
  assert_eq!(bags[1]["subject"], json!("Invoice"));
  assert_eq!(bags[1]["attachment"]["extension"], json!("png"));
}

#[tokio::test]
async fn test_required_value_missing_after_coercion() {
  let coercer = Coercer::new(Arc::new(FileServer), CoercionConfig::default());
  let raw = json!({ "email": null, "attachment": "https://cdn.example.com/gone.pdf" });

  let result = process_inputs(
    &coercer,
    &schema(),
    raw.as_object().unwrap(),
    &CancellationToken::new(),
  )
  .await;

  let err = result.unwrap_err();
  assert_eq!(err.to_string(), "missing required properties: email");
}
