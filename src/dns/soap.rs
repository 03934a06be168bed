//! SOAP framing for the KAS API.
//!
//! KAS takes a JSON document wrapped in a single `Params` element and answers
//! with SOAP-encoded maps (`<item><key/><value/></item>`) and arrays
//! (`<item/>` lists). Responses are decoded into [`KasValue`] trees.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

const ENVELOPE_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="urn:xmethodsInterface" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:SOAP-ENC="http://schemas.xmlsoap.org/soap/encoding/" SOAP-ENV:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#;

/// Wraps a JSON parameter document in a SOAP call of `operation`.
pub fn envelope(operation: &str, params: &str) -> String {
    format!(
        "{open}<SOAP-ENV:Body><ns1:{op}><Params xsi:type=\"xsd:string\">{params}</Params></ns1:{op}></SOAP-ENV:Body></SOAP-ENV:Envelope>",
        open = ENVELOPE_OPEN,
        op = operation,
        params = quick_xml::escape::escape(params),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum KasValue {
    Text(String),
    Map(BTreeMap<String, KasValue>),
    List(Vec<KasValue>),
}

impl KasValue {
    pub fn get(&self, key: &str) -> Option<&KasValue> {
        match self {
            KasValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KasValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Items of an array. An empty array is encoded without children and
    /// therefore decodes as empty text.
    pub fn items(&self) -> &[KasValue] {
        match self {
            KasValue::List(items) => items,
            _ => &[],
        }
    }
}

/// Decoded SOAP response body.
#[derive(Debug, Clone, PartialEq)]
pub enum SoapResponse {
    Return(KasValue),
    Fault(String),
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

pub fn parse_response(body: &str) -> Result<SoapResponse> {
    let root = parse_tree(body)?;

    let soap_body = root
        .child("Body")
        .ok_or_else(|| anyhow!("SOAP response has no Body"))?;
    let content = soap_body
        .children
        .first()
        .ok_or_else(|| anyhow!("SOAP response body is empty"))?;

    if content.name == "Fault" {
        let reason = content
            .child("faultstring")
            .map(|f| f.text.clone())
            .unwrap_or_else(|| "unknown SOAP fault".to_string());
        return Ok(SoapResponse::Fault(reason));
    }

    let ret = content
        .child("return")
        .ok_or_else(|| anyhow!("SOAP response {} has no return value", content.name))?;

    Ok(SoapResponse::Return(to_value(ret)))
}

fn to_value(el: &Element) -> KasValue {
    if el.children.is_empty() {
        return KasValue::Text(el.text.clone());
    }

    let items = el.children.iter().filter(|c| c.name == "item");
    if el.children.iter().all(|c| c.child("key").is_some()) {
        let map = items
            .map(|item| {
                let key = item.child("key").map(|k| k.text.clone()).unwrap_or_default();
                let value = item
                    .child("value")
                    .map(to_value)
                    .unwrap_or_else(|| KasValue::Text(String::new()));
                (key, value)
            })
            .collect();
        KasValue::Map(map)
    } else {
        KasValue::List(items.map(to_value).collect())
    }
}

fn parse_tree(body: &str) -> Result<Element> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().context("malformed SOAP response")? {
            Event::Start(e) => stack.push(Element {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Default::default()
            }),
            Event::Empty(e) => {
                let el = Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => root = Some(el),
                }
            }
            Event::Text(e) => {
                let text = e.unescape().context("malformed SOAP text")?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced SOAP response"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => root = Some(el),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| anyhow!("empty SOAP response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="urn:xmethodsInterface" xmlns:ns2="http://xml.apache.org/xml-soap" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:SOAP-ENC="http://schemas.xmlsoap.org/soap/encoding/">
  <SOAP-ENV:Body>
    <ns1:KasApiResponse>
      <return xsi:type="ns2:Map">
        <item><key xsi:type="xsd:string">Request</key><value xsi:type="ns2:Map">
          <item><key xsi:type="xsd:string">KasRequestTime</key><value xsi:type="xsd:int">1700000000</value></item>
        </value></item>
        <item><key xsi:type="xsd:string">Response</key><value xsi:type="ns2:Map">
          <item><key xsi:type="xsd:string">KasFloodDelay</key><value xsi:type="xsd:float">0.5</value></item>
          <item><key xsi:type="xsd:string">ReturnInfo</key><value SOAP-ENC:arrayType="ns2:Map[1]" xsi:type="SOAP-ENC:Array">
            <item xsi:type="ns2:Map">
              <item><key xsi:type="xsd:string">record_id</key><value xsi:type="xsd:string">42</value></item>
              <item><key xsi:type="xsd:string">record_name</key><value xsi:type="xsd:string">_acme-challenge</value></item>
            </item>
          </value></item>
          <item><key xsi:type="xsd:string">ReturnString</key><value xsi:type="xsd:string">TRUE</value></item>
        </value></item>
      </return>
    </ns1:KasApiResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn test_envelope_escapes_params() {
        let xml = envelope("KasApi", r#"{"record_data":"a<b&c"}"#);

        assert!(xml.contains("<ns1:KasApi><Params xsi:type=\"xsd:string\">"));
        assert!(xml.contains("a&lt;b&amp;c"));
        assert!(xml.ends_with("</ns1:KasApi></SOAP-ENV:Body></SOAP-ENV:Envelope>"));
    }

    #[test]
    fn test_parse_nested_maps_and_arrays() {
        let SoapResponse::Return(ret) = parse_response(API_RESPONSE).unwrap() else {
            panic!("expected return value");
        };

        let response = ret.get("Response").unwrap();
        assert_eq!(
            response.get("KasFloodDelay").and_then(KasValue::as_text),
            Some("0.5")
        );
        assert_eq!(
            response.get("ReturnString").and_then(KasValue::as_text),
            Some("TRUE")
        );

        let info = response.get("ReturnInfo").unwrap().items();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].get("record_id").and_then(KasValue::as_text), Some("42"));
    }

    #[test]
    fn test_parse_plain_string_return() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><ns1:KasAuthResponse xmlns:ns1="urn:xmethodsInterface"><return xsi:type="xsd:string">session-token</return></ns1:KasAuthResponse></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

        assert_eq!(
            parse_response(body).unwrap(),
            SoapResponse::Return(KasValue::Text("session-token".to_string()))
        );
    }

    #[test]
    fn test_parse_fault() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><SOAP-ENV:Fault><faultcode>SOAP-ENV:Server</faultcode><faultstring>kas_password_incorrect</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

        assert_eq!(
            parse_response(body).unwrap(),
            SoapResponse::Fault("kas_password_incorrect".to_string())
        );
    }

    #[test]
    fn test_empty_array_has_no_items() {
        let body = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><ns1:KasApiResponse><return><item><key>ReturnInfo</key><value SOAP-ENC:arrayType="ns2:Map[0]"/></item></return></ns1:KasApiResponse></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

        let SoapResponse::Return(ret) = parse_response(body).unwrap() else {
            panic!("expected return value");
        };
        assert!(ret.get("ReturnInfo").unwrap().items().is_empty());
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_response("not xml at all").is_err());
        assert!(parse_response("<a><b></a>").is_err());
    }
}
