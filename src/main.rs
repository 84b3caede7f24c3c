use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use wayfarer::kernel::event::{Event, PreemptionEvent};
use wayfarer::kernel::geo::Position;
use wayfarer::kernel::playback::PriorityTier;
use wayfarer::kernel::poi::{Poi, PoiCategory, PoiId, PoiMetadata};
use wayfarer::kernel::time::{Clock, ManualClock};
use wayfarer::kernel::trip::LocationSample;
use wayfarer::outputs::sink::TracingPlaybackSink;
use wayfarer::services::audio::HttpAudioService;
use wayfarer::services::llm::LlmTextGenerator;
use wayfarer::services::mock::{MockPoiLookup, MockSpatialRenderer, MockSpeechSynthesizer, MockTextGenerator};
use wayfarer::services::poi::HttpPoiLookup;
use wayfarer::services::store::{JsonlDeliveryLog, MemoryDeliveryLog};
use wayfarer::services::DeliveryLog;
use wayfarer::{Collaborators, EngineConfig, OrchestrationEngine, TripLoop};

const DRIVE_MINUTES: i64 = 90;
const METERS_PER_MINUTE: f64 = 1000.0;
/// Real time per simulated minute.
const STEP: Duration = Duration::from_millis(60);

fn route_start() -> Position {
    Position::new(45.0, 7.0)
}

fn poi(id: &str, km: f64, category: PoiCategory, name: &str, seed: &str, bookable: bool) -> Poi {
    Poi {
        id: PoiId::new(id),
        category,
        location: route_start().offset(90.0, km * 1000.0).offset(0.0, 150.0),
        metadata: PoiMetadata {
            name: name.to_string(),
            description_seed: seed.to_string(),
            bookable,
        },
    }
}

fn demo_pois() -> Vec<Poi> {
    vec![
        poi("castle", 3.0, PoiCategory::Landmark, "Old Castle", "a 12th century hilltop fortress", false),
        poi("mill", 16.0, PoiCategory::History, "Water Mill", "a restored grain mill from 1820", false),
        poi("lake", 29.0, PoiCategory::Nature, "Blue Lake", "a glacial lake fed by three streams", false),
        poi("inn", 41.0, PoiCategory::Lodging, "Roadside Inn", "a family-run inn with twelve rooms", true),
        poi("museum", 57.0, PoiCategory::Culture, "Valley Museum", "local crafts and farm tools", false),
        poi("diner", 70.0, PoiCategory::Food, "Route Diner", "known for its apple pie", false),
        poi("bridge", 84.0, PoiCategory::Landmark, "Stone Bridge", "a Roman-era arch bridge", false),
    ]
}

fn collaborators(live: bool, config: &EngineConfig) -> Collaborators {
    let delivery_log: Arc<dyn DeliveryLog> = match std::env::var("DELIVERY_LOG_PATH") {
        Ok(path) => Arc::new(JsonlDeliveryLog::new(path)),
        Err(_) => Arc::new(MemoryDeliveryLog::new()),
    };

    if live {
        let audio = Arc::new(HttpAudioService::from_env(config.timeouts.synthesis));
        return Collaborators {
            text: Arc::new(LlmTextGenerator::from_env(config.timeouts.generation)),
            speech: audio.clone(),
            spatial: audio,
            poi: Arc::new(HttpPoiLookup::from_env(config.timeouts.poi_lookup)),
            sink: Arc::new(TracingPlaybackSink::new()),
            delivery_log,
        };
    }

    Collaborators {
        text: Arc::new(MockTextGenerator::default()),
        speech: Arc::new(MockSpeechSynthesizer::default()),
        spatial: Arc::new(MockSpatialRenderer::default()),
        poi: Arc::new(MockPoiLookup::with_pois(demo_pois())),
        sink: Arc::new(TracingPlaybackSink::new()),
        delivery_log,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = EngineConfig::from_env()?;
    // One tick per simulated minute.
    config.story_check_interval = STEP;

    let live = std::env::var("WAYFARER_LIVE").is_ok_and(|v| v == "1");
    tracing::info!(live, "Wayfarer demo drive starting");

    let engine = OrchestrationEngine::start(config.clone(), collaborators(live, &config))?;
    let mut status = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match status.recv().await {
                Ok(event) => println!("[STATUS] {} {} -> {}", event.at.format("%H:%M"), event.from, event.to),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "status listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let (tx, rx) = mpsc::channel(64);
    let trip = tokio::spawn(TripLoop::new(engine, rx, clock.clone()).run());

    let origin = route_start();
    for minute in 0..=DRIVE_MINUTES {
        let at = start + TimeDelta::minutes(minute);
        clock.set(at);
        let here = origin.offset(90.0, minute as f64 * METERS_PER_MINUTE);
        let sample = LocationSample {
            lat: here.lat,
            lon: here.lon,
            heading_degrees: 90.0,
            speed_mps: METERS_PER_MINUTE / 60.0,
            timestamp: clock.now(),
        };
        tx.send(Event::Location(sample)).await?;

        // Every piece of content plays for about two minutes.
        if minute % 2 == 1 {
            tx.send(Event::PlaybackFinished).await?;
        }
        if minute == 33 {
            let mut alert = PreemptionEvent::new(PriorityTier::NavigationAlert, "nav://exit-12");
            alert.text = Some("In 500 meters, take exit 12.".to_string());
            tx.send(Event::Preemption(alert)).await?;
        }
        tokio::time::sleep(STEP).await;
    }

    tx.send(Event::EndTrip).await?;
    let summary = trip.await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
