// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use cropcast_app::{CascadeField, LookupScope};
use serde_json::{Map, Value, json};
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use time::Date;
use time::macros::format_description;
use tiny_http::{Header, Method, Response, Server};
use tracing::debug;
use url::Url;

/// A complete path through the sample catalog with an exact price history.
pub const SAMPLE_PATH: [&str; 6] = ["Kerala", "Idukki", "Kattappana", "Cardamom", "Small", "FAQ"];

/// Fallback levels tried after an exact match, most specific first.
pub const FALLBACK_LEVELS: [&str; 4] = [
    "state+district+market+commodity+variety",
    "state+district+market+commodity",
    "state+commodity",
    "commodity",
];

struct MarketListing {
    state: &'static str,
    district: &'static str,
    market: &'static str,
    commodities: &'static [&'static str],
}

const MARKETS: [MarketListing; 9] = [
    MarketListing {
        state: "Kerala",
        district: "Idukki",
        market: "Kattappana",
        commodities: &["Cardamom", "Pepper", "Coffee"],
    },
    MarketListing {
        state: "Kerala",
        district: "Idukki",
        market: "Nedumkandam",
        commodities: &["Cardamom", "Pepper"],
    },
    MarketListing {
        state: "Kerala",
        district: "Ernakulam",
        market: "Perumbavoor",
        commodities: &["Banana", "Pepper"],
    },
    MarketListing {
        state: "Karnataka",
        district: "Kodagu",
        market: "Madikeri",
        commodities: &["Coffee", "Pepper", "Cardamom"],
    },
    MarketListing {
        state: "Karnataka",
        district: "Mysuru",
        market: "Mysuru",
        commodities: &["Rice", "Tomato", "Banana"],
    },
    MarketListing {
        state: "Maharashtra",
        district: "Nashik",
        market: "Lasalgaon",
        commodities: &["Onion", "Tomato"],
    },
    MarketListing {
        state: "Maharashtra",
        district: "Nashik",
        market: "Pimpalgaon",
        commodities: &["Onion", "Tomato"],
    },
    MarketListing {
        state: "Maharashtra",
        district: "Pune",
        market: "Pune",
        commodities: &["Onion", "Rice", "Banana"],
    },
    MarketListing {
        state: "Tamil Nadu",
        district: "Thanjavur",
        market: "Kumbakonam",
        commodities: &["Rice", "Banana"],
    },
];

const VARIETIES: [(&str, &[&str]); 7] = [
    ("Banana", &["Nendran", "Robusta", "Poovan"]),
    ("Cardamom", &["Small", "Large"]),
    ("Coffee", &["Arabica", "Robusta"]),
    ("Onion", &["Red", "White"]),
    ("Pepper", &["Garbled", "Ungarbled"]),
    ("Rice", &["Sona Masuri", "Ponni"]),
    ("Tomato", &["Hybrid", "Local"]),
];

const GRADES: [(&str, &str, &[&str]); 15] = [
    ("Banana", "Nendran", &["FAQ", "Medium"]),
    ("Banana", "Robusta", &["FAQ"]),
    ("Banana", "Poovan", &["FAQ", "Small"]),
    ("Cardamom", "Small", &["FAQ", "Bold", "Medium"]),
    ("Cardamom", "Large", &["FAQ"]),
    ("Coffee", "Arabica", &["Plantation A", "Cherry AB"]),
    ("Coffee", "Robusta", &["Cherry AB", "Parchment"]),
    ("Onion", "Red", &["FAQ", "Large", "Medium"]),
    ("Onion", "White", &["FAQ"]),
    ("Pepper", "Garbled", &["MG1", "FAQ"]),
    ("Pepper", "Ungarbled", &["FAQ"]),
    ("Rice", "Sona Masuri", &["FAQ", "Medium"]),
    ("Rice", "Ponni", &["FAQ"]),
    ("Tomato", "Hybrid", &["FAQ", "Local"]),
    ("Tomato", "Local", &["FAQ"]),
];

/// Base modal price per quintal.
const BASE_PRICES: [(&str, f64); 7] = [
    ("Banana", 2_650.0),
    ("Cardamom", 152_000.0),
    ("Coffee", 31_500.0),
    ("Onion", 1_850.0),
    ("Pepper", 58_400.0),
    ("Rice", 3_900.0),
    ("Tomato", 1_400.0),
];

const MONTH_FACTORS: [f64; 12] = [
    1.04, 1.02, 0.98, 0.95, 0.93, 0.96, 1.01, 1.05, 1.08, 1.06, 1.03, 1.05,
];

const GRADE_FACTORS: [f64; 3] = [1.0, 0.92, 0.86];

/// The full input of one estimate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateRequest {
    pub path: [String; 6],
    pub date: Date,
}

impl EstimateRequest {
    pub fn value(&self, field: CascadeField) -> &str {
        &self.path[field.position()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub prediction: f64,
    pub fallback_used: &'static str,
}

/// A small deterministic region/market/commodity catalog with a toy price model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCatalog;

impl SampleCatalog {
    /// Options for `field` under `scope`, in first-seen order.
    ///
    /// Varieties depend only on the commodity and grades only on the
    /// commodity and variety; the other ancestors are accepted but unused.
    pub fn options(&self, field: CascadeField, scope: &LookupScope) -> Vec<String> {
        let value = |field: CascadeField| scope.value(field).unwrap_or_default();
        let mut options: Vec<&str> = Vec::new();
        match field {
            CascadeField::Region => {
                for listing in &MARKETS {
                    push_unique(&mut options, listing.state);
                }
            }
            CascadeField::Subregion => {
                for listing in MARKETS
                    .iter()
                    .filter(|listing| listing.state == value(CascadeField::Region))
                {
                    push_unique(&mut options, listing.district);
                }
            }
            CascadeField::Locality => {
                for listing in MARKETS.iter().filter(|listing| {
                    listing.state == value(CascadeField::Region)
                        && listing.district == value(CascadeField::Subregion)
                }) {
                    push_unique(&mut options, listing.market);
                }
            }
            CascadeField::Product => {
                if let Some(listing) = find_market(
                    value(CascadeField::Region),
                    value(CascadeField::Subregion),
                    value(CascadeField::Locality),
                ) {
                    options.extend(listing.commodities.iter().copied());
                }
            }
            CascadeField::Subtype => {
                options.extend(varieties(value(CascadeField::Product)).iter().copied());
            }
            CascadeField::Grade => {
                options.extend(
                    grades(value(CascadeField::Product), value(CascadeField::Subtype))
                        .iter()
                        .copied(),
                );
            }
        }
        options.into_iter().map(str::to_owned).collect()
    }

    /// Prices `request`, falling back to coarser groupings when the exact
    /// combination has no history. Returns `None` when even the commodity is
    /// unknown.
    pub fn estimate(&self, request: &EstimateRequest) -> Option<Estimate> {
        let state = request.value(CascadeField::Region);
        let district = request.value(CascadeField::Subregion);
        let market = request.value(CascadeField::Locality);
        let commodity = request.value(CascadeField::Product);
        let variety = request.value(CascadeField::Subtype);
        let grade = request.value(CascadeField::Grade);

        let base = BASE_PRICES
            .iter()
            .find(|(name, _)| *name == commodity)
            .map(|(_, price)| *price)?;

        let carries = find_market(state, district, market)
            .is_some_and(|listing| listing.commodities.contains(&commodity));
        let grade_rank = grades(commodity, variety)
            .iter()
            .position(|candidate| *candidate == grade);

        let fallback_used = match (carries, grade_rank) {
            (true, Some(0)) => "exact",
            (true, Some(_)) => FALLBACK_LEVELS[0],
            (true, None) if varieties(commodity).contains(&variety) => FALLBACK_LEVELS[0],
            (true, None) => FALLBACK_LEVELS[1],
            (false, _)
                if MARKETS.iter().any(|listing| {
                    listing.state == state && listing.commodities.contains(&commodity)
                }) =>
            {
                FALLBACK_LEVELS[2]
            }
            (false, _) => FALLBACK_LEVELS[3],
        };

        let month_factor = MONTH_FACTORS[usize::from(u8::from(request.date.month())) - 1];
        let grade_factor = grade_rank
            .and_then(|rank| GRADE_FACTORS.get(rank))
            .copied()
            .unwrap_or(1.0);
        let local_factor = 0.9 + 0.2 * DeterministicRng::for_key(&[market, variety]).unit();

        let prediction = round_cents(base * month_factor * grade_factor * local_factor);
        Some(Estimate {
            prediction,
            fallback_used,
        })
    }

    pub fn metadata(&self) -> Value {
        json!({
            "model": "sample-price-model",
            "target": "modal_price",
            "unit": "per quintal",
            "currency": "INR",
            "trained_through": "2026-06-30",
            "fallback_levels": FALLBACK_LEVELS,
        })
    }
}

fn push_unique<'a>(options: &mut Vec<&'a str>, value: &'a str) {
    if !options.contains(&value) {
        options.push(value);
    }
}

fn find_market(state: &str, district: &str, market: &str) -> Option<&'static MarketListing> {
    MARKETS.iter().find(|listing| {
        listing.state == state && listing.district == district && listing.market == market
    })
}

fn varieties(commodity: &str) -> &'static [&'static str] {
    VARIETIES
        .iter()
        .find(|(name, _)| *name == commodity)
        .map(|(_, varieties)| *varieties)
        .unwrap_or(&[])
}

fn grades(commodity: &str, variety: &str) -> &'static [&'static str] {
    GRADES
        .iter()
        .find(|(name, kind, _)| *name == commodity && *kind == variety)
        .map(|(_, _, grades)| *grades)
        .unwrap_or(&[])
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn for_key(parts: &[&str]) -> Self {
        // FNV-1a over the parts, separated so ("ab","c") != ("a","bc").
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for part in parts {
            for byte in part.bytes().chain(std::iter::once(0x1f)) {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
        }
        let state = hash ^ 0x9E37_79B9_7F4A_7C15;
        Self {
            state: if state == 0 { 0xA409_3822_299F_31D0 } else { state },
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }
}

/// A reply from the mock service: HTTP status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub status: u16,
    pub body: Value,
}

impl MockReply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn detail(status: u16, detail: impl Into<Value>) -> Self {
        Self {
            status,
            body: json!({ "detail": detail.into() }),
        }
    }
}

/// Routes one request against the sample catalog. `target` is the raw
/// request target, path plus optional query string.
pub fn route(catalog: &SampleCatalog, method: &Method, target: &str, body: &str) -> MockReply {
    let Ok(url) = Url::parse("http://mock.invalid").and_then(|base| base.join(target)) else {
        return MockReply::detail(400, "malformed request target");
    };

    match (method, url.path()) {
        (Method::Get, "/") => MockReply::ok(json!({
            "status": "running",
            "model_info": catalog.metadata(),
        })),
        (Method::Get, "/metadata") => MockReply::ok(catalog.metadata()),
        (Method::Post, "/predict") => predict(catalog, body),
        (Method::Get, path) => {
            let endpoint = path.trim_start_matches('/');
            match CascadeField::ALL
                .into_iter()
                .find(|field| field.endpoint() == endpoint)
            {
                Some(field) => list(catalog, field, &url),
                None => MockReply::detail(404, "Not Found"),
            }
        }
        _ => MockReply::detail(405, "Method Not Allowed"),
    }
}

fn list(catalog: &SampleCatalog, field: CascadeField, url: &Url) -> MockReply {
    let scope: LookupScope = url
        .query_pairs()
        .filter_map(|(key, value)| CascadeField::parse(&key).map(|key| (key, value.into_owned())))
        .collect();

    let missing: Vec<Value> = field
        .ancestors()
        .iter()
        .filter(|ancestor| scope.value(**ancestor).is_none())
        .map(|ancestor| {
            json!({
                "loc": ["query", ancestor.param()],
                "msg": "field required",
            })
        })
        .collect();
    if !missing.is_empty() {
        return MockReply::detail(422, Value::Array(missing));
    }

    MockReply::ok(json!(catalog.options(field, &scope)))
}

fn predict(catalog: &SampleCatalog, body: &str) -> MockReply {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return MockReply::detail(
            422,
            json!([{ "loc": ["body"], "msg": "expected a JSON object" }]),
        );
    };

    let request = match parse_estimate_request(&fields) {
        Ok(request) => request,
        Err(detail) => return MockReply::detail(400, detail),
    };

    match catalog.estimate(&request) {
        Some(estimate) => MockReply::ok(json!({
            "prediction": estimate.prediction,
            "fallback_used": estimate.fallback_used,
        })),
        None => MockReply::detail(400, "No matching feature group found"),
    }
}

fn parse_estimate_request(fields: &Map<String, Value>) -> std::result::Result<EstimateRequest, String> {
    let text = |key: &str| match fields.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(format!("Missing features: ['{key}']")),
    };

    let path = [
        text(CascadeField::Region.param())?,
        text(CascadeField::Subregion.param())?,
        text(CascadeField::Locality.param())?,
        text(CascadeField::Product.param())?,
        text(CascadeField::Subtype.param())?,
        text(CascadeField::Grade.param())?,
    ];
    let raw_date = text("date")?;
    let date = Date::parse(&raw_date, format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("invalid date {raw_date:?}: {error}"))?;
    Ok(EstimateRequest { path, date })
}

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Delay applied before every reply.
    pub latency: Duration,
    /// Answer the region list with a server error.
    pub fail_regions: bool,
}

/// The sample catalog served over HTTP on an ephemeral localhost port.
pub struct MockService {
    base_url: String,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockService {
    pub fn start() -> Result<Self> {
        Self::start_with(MockOptions::default())
    }

    pub fn start_with(options: MockOptions) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start mock estimation service: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let server = Arc::new(server);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            thread::spawn(move || serve(&server, &options, &requests))
        };

        debug!(%base_url, "mock estimation service listening");
        Ok(Self {
            base_url,
            server,
            requests,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request targets seen so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(server: &Server, options: &MockOptions, requests: &Mutex<Vec<String>>) {
    let catalog = SampleCatalog;
    for mut request in server.incoming_requests() {
        let target = request.url().to_owned();
        requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());

        let mut body = String::new();
        let reply = match request.as_reader().read_to_string(&mut body) {
            Ok(_) if options.fail_regions && target.starts_with("/states") => {
                MockReply::detail(500, "feature store unavailable")
            }
            Ok(_) => route(&catalog, request.method(), &target, &body),
            Err(error) => MockReply::detail(400, format!("unreadable body: {error}")),
        };

        if !options.latency.is_zero() {
            thread::sleep(options.latency);
        }
        debug!(method = %request.method(), %target, status = reply.status, "mock reply");
        let _ = request.respond(json_response(&reply));
    }
}

fn json_response(reply: &MockReply) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string(reply.body.to_string()).with_status_code(reply.status);
    match Header::from_bytes("Content-Type", "application/json") {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
