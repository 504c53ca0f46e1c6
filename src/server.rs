use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::error::EngineError;
use crate::model::Sample;
use crate::window::Lookback;
use crate::TickDb;

type Query = Vec<(String, String)>;

/// Errors a request can end in, before or inside the engine.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::UnknownSymbol(_)) => StatusCode::NOT_FOUND,
            Self::Engine(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Engine(e) => e.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self.message());
        } else {
            debug!("Request rejected ({}): {}", status, self.message());
        }
        let body = json!({ "error": self.message() });
        warp::reply::with_status(warp::reply::json(&body), status).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AverageResponse {
    average_stock_price: f64,
    price_history: Vec<Sample>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StockLeg {
    average_price: f64,
    price_history: Vec<Sample>,
}

#[derive(Serialize)]
struct CorrelationResponse {
    correlation: f64,
    stocks: BTreeMap<String, StockLeg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatrixResponse {
    tickers: Vec<String>,
    matrix: BTreeMap<String, BTreeMap<String, f64>>,
    averages: BTreeMap<String, f64>,
    standard_deviations: BTreeMap<String, f64>,
}

pub struct TickServer {
    db: Arc<TickDb>,
}

impl TickServer {
    pub fn new(db: Arc<TickDb>) -> Self {
        Self { db }
    }

    pub async fn run(&self, addr: SocketAddr) {
        info!("TickDB HTTP API listening on {}", addr);
        warp::serve(routes(self.db.clone())).run(addr).await;
    }
}

/// All HTTP routes:
///
/// - `GET /tickers`
/// - `GET /stocks/{ticker}?minutes=M&aggregation=average`
/// - `GET /stockcorrelation?minutes=M&ticker=A&ticker=B`
/// - `GET /correlationmatrix?minutes=M`
pub fn routes(db: Arc<TickDb>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let tickers = warp::get()
    .and(warp::path!("tickers"))
    .and(with_db(db.clone()))
    .and_then(handle_tickers);

    let average = warp::get()
    .and(warp::path!("stocks" / String))
    .and(warp::query::<Query>())
    .and(with_db(db.clone()))
    .and_then(handle_average);

    let correlation = warp::get()
    .and(warp::path!("stockcorrelation"))
    .and(warp::query::<Query>())
    .and(with_db(db.clone()))
    .and_then(handle_correlation);

    let matrix = warp::get()
    .and(warp::path!("correlationmatrix"))
    .and(warp::query::<Query>())
    .and(with_db(db))
    .and_then(handle_matrix);

    tickers.or(average).unify().or(correlation).unify().or(matrix).unify()
}

fn with_db(db: Arc<TickDb>) -> impl Filter<Extract = (Arc<TickDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn respond(result: Result<Response, ApiError>) -> Result<Response, Infallible> {
    Ok(result.unwrap_or_else(ApiError::into_response))
}

fn param<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn lookback(query: &Query) -> Result<Lookback, ApiError> {
    match param(query, "minutes") {
        Some(raw) => Ok(Lookback::parse(raw)?),
        None => Err(ApiError::BadRequest("minutes is required (1-60).".to_string())),
    }
}

// --- HANDLERS ---

async fn handle_tickers(db: Arc<TickDb>) -> Result<Response, Infallible> {
    Ok(warp::reply::json(&db.symbols()).into_response())
}

async fn handle_average(ticker: String, query: Query, db: Arc<TickDb>) -> Result<Response, Infallible> {
    respond(average(&ticker.to_uppercase(), &query, &db))
}

fn average(ticker: &str, query: &Query, db: &TickDb) -> Result<Response, ApiError> {
    if !db.store().contains(ticker) {
        return Err(EngineError::UnknownSymbol(ticker.to_string()).into());
    }
    let lookback = lookback(query)?;
    if param(query, "aggregation") != Some("average") {
        return Err(ApiError::BadRequest("Only aggregation=average supported.".to_string()));
    }

    let result = db.window_average(ticker, i64::from(lookback.minutes()), Utc::now())?;
    let body = AverageResponse {
        average_stock_price: result.average,
        price_history: result.series,
    };
    Ok(warp::reply::json(&body).into_response())
}

async fn handle_correlation(query: Query, db: Arc<TickDb>) -> Result<Response, Infallible> {
    respond(correlation(&query, &db))
}

fn correlation(query: &Query, db: &TickDb) -> Result<Response, ApiError> {
    let lookback = lookback(query)?;
    let tickers: Vec<String> = query
    .iter()
    .filter(|(k, _)| k == "ticker" || k == "ticker[]")
    .map(|(_, v)| v.to_uppercase())
    .collect();

    let [a, b] = tickers.as_slice() else {
        return Err(ApiError::BadRequest("Provide exactly two ticker values.".to_string()));
    };

    let result = db.correlation(a, b, i64::from(lookback.minutes()), Utc::now())?;

    let mut stocks = BTreeMap::new();
    stocks.insert(a.clone(), StockLeg { average_price: result.mean_a, price_history: result.aligned_a });
    stocks.insert(b.clone(), StockLeg { average_price: result.mean_b, price_history: result.aligned_b });

    let body = CorrelationResponse {
        correlation: result.correlation,
        stocks,
    };
    Ok(warp::reply::json(&body).into_response())
}

async fn handle_matrix(query: Query, db: Arc<TickDb>) -> Result<Response, Infallible> {
    respond(matrix(&query, &db))
}

fn matrix(query: &Query, db: &TickDb) -> Result<Response, ApiError> {
    let lookback = lookback(query)?;
    let m = db.correlation_matrix(i64::from(lookback.minutes()), Utc::now())?;

    let mut matrix = BTreeMap::new();
    let mut averages = BTreeMap::new();
    let mut sds = BTreeMap::new();

    for (i, a) in m.symbols.iter().enumerate() {
        let row: BTreeMap<String, f64> = m.symbols.iter().cloned().zip(m.values[i].iter().copied()).collect();
        matrix.insert(a.clone(), row);
        averages.insert(a.clone(), m.summaries[i].mean);
        sds.insert(a.clone(), m.summaries[i].std_dev);
    }

    let body = MatrixResponse {
        tickers: m.symbols,
        matrix,
        averages,
        standard_deviations: sds,
    };
    Ok(warp::reply::json(&body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |e: EngineError| ApiError::from(e).status();
        assert_eq!(status(EngineError::UnknownSymbol("NFLX".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(EngineError::InvalidWindow("0".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::InvalidPrice(f64::NAN)), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::Poisoned("AAPL".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(EngineError::EmptyWindow), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
