//! Clock port - 時刻の抽象化
//!
//! - **SystemClock**: 本番用。単調増加する壁時計
//! - **ManualClock**: テスト用。手動で進める

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Instant;

/// Clock は現在時刻を提供
///
/// # 要件
/// - 単調増加（巻き戻らない）。タイムスタンプの不変条件
///   `completed_at >= started_at >= scheduled_at` はこれに依存する
/// - `Send + Sync`（スケジューラの各ループから共有される）
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// SystemClock は起動時の壁時計 + 単調時計の経過時間
///
/// NTP などで壁時計が戻っても、返す値は巻き戻らない。
/// tokio の `Instant` を使うので、`start_paused` のテストでは仮想時間で進む。
#[derive(Debug, Clone)]
pub struct SystemClock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Utc::now(),
            mono_anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.mono_anchor.elapsed();
        let elapsed = ChronoDuration::from_std(elapsed).unwrap_or(ChronoDuration::zero());
        self.wall_anchor + elapsed
    }
}

/// ManualClock はテスト用の時計
///
/// `advance` で進めるまで同じ時刻を返す。Clone したものは同じ時刻を共有する。
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
    }
}
