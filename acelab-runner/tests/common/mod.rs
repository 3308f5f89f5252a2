#![allow(dead_code)]

//! Shared harness for cycle integration tests: temp state/store roots, a
//! scripted LLM, fixture market data, and a recording notifier.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use acelab_core::domain::Candle;
use acelab_core::llm::{RobustJsonDecoder, ScriptedClient};
use acelab_core::roles::{Curator, Executor, Generator, Reflector};
use acelab_core::sim::PriceReplaySimulator;
use acelab_runner::{
    AceConfig, DailyCycle, FixtureProvider, LocalDirStore, Notifier, NotifyError, Paths,
    StateSynchronizer, WeeklyCycle,
};

pub struct TestEnv {
    pub tmp: TempDir,
    pub state_root: PathBuf,
    pub store_root: PathBuf,
    pub fixture_root: PathBuf,
    pub sent: Arc<Mutex<Vec<String>>>,
}

pub struct RecordingNotifier(pub Arc<Mutex<Vec<String>>>);

impl Notifier for RecordingNotifier {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub fn env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let state_root = tmp.path().join("state");
    let store_root = tmp.path().join("store");
    let fixture_root = tmp.path().join("fixtures");
    std::fs::create_dir_all(&fixture_root).unwrap();
    TestEnv {
        tmp,
        state_root,
        store_root,
        fixture_root,
        sent: Arc::new(Mutex::new(Vec::new())),
    }
}

pub fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 29).unwrap()
}

pub fn run_instant(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

/// 15-minute candle `i` intervals after the default 13:00 UTC session open.
pub fn session_candle(date: NaiveDate, i: i64, low: f64, high: f64) -> Candle {
    let open_time = Utc.from_utc_datetime(&date.and_hms_opt(13, 0, 0).unwrap())
        + Duration::minutes(15 * i);
    let mid = (low + high) / 2.0;
    Candle::new(open_time, mid, high, low, mid)
}

pub fn write_snapshot_fixture(env: &TestEnv) {
    let snapshot = serde_json::json!({
        "pair": "EURUSD",
        "current_price": 1.0845,
        "current_time_utc": "2025-10-29T12:00:00Z",
        "timeframes": {
            "H4": {"trend": "bullish", "key_support": [1.0820], "key_resistance": [1.0900]}
        },
        "volatility": {"atr_daily_pips": 80.0},
        "economic_events": [],
        "intermarket": {"DXY": "bearish"}
    });
    std::fs::write(
        env.fixture_root.join("snapshot.json"),
        serde_json::to_string_pretty(&snapshot).unwrap(),
    )
    .unwrap();
}

pub fn write_ohlc_fixture(env: &TestEnv, date: NaiveDate, candles: &[Candle]) {
    std::fs::write(
        env.fixture_root.join(format!("ohlc_{date}.json")),
        serde_json::to_string_pretty(candles).unwrap(),
    )
    .unwrap();
}

/// Daily cycle wired against the env's temp roots with scripted generator
/// responses.
pub fn daily_cycle(env: &TestEnv, date: NaiveDate, responses: Vec<&str>) -> DailyCycle {
    let config = AceConfig::default();
    let paths = Paths::new(&env.state_root);
    DailyCycle {
        session: config.session,
        pair: config.instrument.pair.clone(),
        generator: Generator::new(
            Box::new(ScriptedClient::with_texts(responses)),
            RobustJsonDecoder::new(Some(paths.debug_dir(date))),
            config.generation_config(),
        ),
        executor: Executor::new(PriceReplaySimulator::new(config.simulator_config())),
        market: Box::new(FixtureProvider::new(&env.fixture_root)),
        notifier: Box::new(RecordingNotifier(env.sent.clone())),
        sync: StateSynchronizer::new(
            Box::new(LocalDirStore::new(&env.store_root)),
            Paths::new(&env.state_root),
            config.state.retention_days,
            None,
        ),
        paths,
    }
}

/// Weekly cycle on top of a scripted daily cycle; `reflector_responses`
/// drives the reflection call.
pub fn weekly_cycle(
    env: &TestEnv,
    date: NaiveDate,
    daily_responses: Vec<&str>,
    reflector_responses: Vec<&str>,
) -> WeeklyCycle {
    let config = AceConfig::default();
    WeeklyCycle {
        daily: daily_cycle(env, date, daily_responses),
        reflector: Reflector::new(
            Box::new(ScriptedClient::with_texts(reflector_responses)),
            RobustJsonDecoder::new(Some(Paths::new(&env.state_root).debug_dir(date))),
            config.reflector_config(),
        ),
        curator: Curator::new(config.prune_thresholds()),
    }
}

pub const BULLISH_PLAN_JSON: &str = r#"{
    "date": "2025-10-29",
    "bias": "bullish",
    "entry_zone": [1.0840, 1.0850],
    "stop_loss": 1.0820,
    "take_profit_1": 1.0900,
    "take_profit_2": null,
    "position_size_pct": 0.5,
    "risk_reward": "1:2.8",
    "rationale": "H4 demand retest with intermarket support",
    "playbook_entries_used": ["strat-001", "strat-003"],
    "confidence": "high"
}"#;

pub const NEUTRAL_PLAN_JSON: &str = r#"{
    "bias": "neutral",
    "entry_zone": [],
    "rationale": "mixed signals, standing aside",
    "playbook_entries_used": [],
    "confidence": "low"
}"#;
