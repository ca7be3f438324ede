//! Tipos de dados para as respostas da API ShipIt.
//!
//! A resposta bruta é desserializada em structs privadas com campos
//! opcionais e então validada por [`parse_api_response`], que produz um
//! [`ShipmentStatus`] com eventos já convertidos para UTC.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TrackingError;

/// Rótulo do evento de entrega, comum a todas as transportadoras.
pub const DELIVERED_LABEL: &str = "Delivered";

/// Transportadoras suportadas pela API ShipIt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Ups,
    Fedex,
}

impl Carrier {
    /// Segmento de caminho usado na URL da API (`/ups/...`, `/fedex/...`).
    pub fn as_path(&self) -> &'static str {
        match self {
            Carrier::Ups => "ups",
            Carrier::Fedex => "fedex",
        }
    }

    /// Rótulo do evento que indica a coleta pela transportadora.
    pub fn pickup_label(&self) -> &'static str {
        match self {
            Carrier::Ups => "Origin scan",
            Carrier::Fedex => "Picked up",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Carrier::Ups => write!(f, "UPS"),
            Carrier::Fedex => write!(f, "FedEx"),
        }
    }
}

/// Detecta a transportadora a partir do formato do número de rastreio.
///
/// Números com prefixo `1Z` são UPS; exatamente 12 dígitos são FedEx.
/// Qualquer outro formato retorna `None`.
pub fn classify(tracking_number: &str) -> Option<Carrier> {
    if tracking_number.starts_with("1Z") {
        return Some(Carrier::Ups);
    }
    if tracking_number.len() == 12 && tracking_number.bytes().all(|b| b.is_ascii_digit()) {
        return Some(Carrier::Fedex);
    }
    None
}

/// Um evento de rastreio com rótulo e instante em UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

/// Status de uma remessa, construído a cada consulta e nunca persistido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentStatus {
    /// Número de rastreio ecoado pela API.
    pub tracking_number: String,
    pub carrier: Carrier,
    /// Eventos na ordem em que a API os retornou.
    pub events: Vec<TrackingEvent>,
}

impl ShipmentStatus {
    /// Instante do primeiro evento com rótulo "Delivered", se houver.
    pub fn delivery_time(&self) -> Option<DateTime<Utc>> {
        self.first_event(DELIVERED_LABEL)
    }

    /// Instante do primeiro evento de coleta da transportadora, se houver.
    pub fn pickup_time(&self) -> Option<DateTime<Utc>> {
        self.first_event(self.carrier.pickup_label())
    }

    fn first_event(&self, label: &str) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .find(|event| event.label == label)
            .map(|event| event.timestamp)
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    request: Option<RawRequest>,
    activities: Option<Vec<RawActivity>>,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(rename = "trackingNumber")]
    tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    details: Option<String>,
    timestamp: Option<String>,
}

/// Converte o corpo JSON de uma resposta da API em um [`ShipmentStatus`].
///
/// Falha com [`TrackingError::MalformedResponse`] se o corpo não for JSON,
/// se `request.trackingNumber` ou `activities` estiverem ausentes, ou se
/// alguma atividade não tiver `details` e um `timestamp` válido.
pub fn parse_api_response(carrier: Carrier, body: &str) -> Result<ShipmentStatus, TrackingError> {
    let raw: RawResponse = serde_json::from_str(body)
        .map_err(|e| TrackingError::MalformedResponse(e.to_string()))?;

    let tracking_number = raw
        .request
        .and_then(|r| r.tracking_number)
        .ok_or_else(|| TrackingError::MalformedResponse("missing request.trackingNumber".into()))?;

    let activities = raw
        .activities
        .ok_or_else(|| TrackingError::MalformedResponse("missing activities".into()))?;

    let events = activities
        .into_iter()
        .enumerate()
        .map(|(i, activity)| {
            let label = activity.details.ok_or_else(|| {
                TrackingError::MalformedResponse(format!("activity {i} has no details"))
            })?;
            let raw_ts = activity.timestamp.ok_or_else(|| {
                TrackingError::MalformedResponse(format!("activity {i} has no timestamp"))
            })?;
            let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
                TrackingError::MalformedResponse(format!("activity {i} has invalid timestamp '{raw_ts}'"))
            })?;
            Ok(TrackingEvent { label, timestamp })
        })
        .collect::<Result<Vec<_>, TrackingError>>()?;

    Ok(ShipmentStatus {
        tracking_number,
        carrier,
        events,
    })
}

/// Interpreta um instante ISO-8601. Valores sem fuso são tratados como UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
