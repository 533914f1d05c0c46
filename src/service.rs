use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::availability::{
    time_string_to_minutes, Aggregator, MonthlyAvailability, PlanType, PoolSnapshot, ResourceKind, ResourcePool,
    SlotAvailability, SlotDiagnosis, Snapshot,
};
use crate::cache::{self, AvailabilityCache, KEY_ROOT};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{AvailabilityError, Result};
use crate::store::AvailabilityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub query_time_ms: u64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityResponse<T> {
    pub data: T,
    pub metadata: QueryMetadata,
}

/// Write-side notifications that can change availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvailabilityEvent {
    AppointmentBooked { date: NaiveDate },
    AppointmentCancelled { date: NaiveDate },
    TaskAssigned { date: NaiveDate },
    BlockedDateChanged { date: NaiveDate },
    /// Weekly rows edited; no single date is affected
    AvailabilityRulesChanged,
}

impl AvailabilityEvent {
    pub fn affected_date(&self) -> Option<NaiveDate> {
        match self {
            AvailabilityEvent::AppointmentBooked { date }
            | AvailabilityEvent::AppointmentCancelled { date }
            | AvailabilityEvent::TaskAssigned { date }
            | AvailabilityEvent::BlockedDateChanged { date } => Some(*date),
            AvailabilityEvent::AvailabilityRulesChanged => None,
        }
    }
}

/// Validating façade over fetch, conflict detection, aggregation and cache
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
    cache: Arc<dyn AvailabilityCache>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    aggregator: Aggregator,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        cache: Arc<dyn AvailabilityCache>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            clock: Arc::new(SystemClock),
            aggregator: Aggregator::new(&config),
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn timezone(&self) -> Tz {
        self.config.business_hours.timezone
    }

    /// Local hour bucket; slots start on the hour, so results computed
    /// within one bucket agree on which slots have started
    fn as_of(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone()).format("%Y-%m-%dT%H").to_string()
    }

    /// Day-level tiers for every remaining date of a month
    pub async fn get_monthly_availability(
        &self,
        plan_type: PlanType,
        year: i32,
        month: u32,
        number_of_units: u32,
    ) -> Result<AvailabilityResponse<MonthlyAvailability>> {
        let first_of_month = validate_year_month(year, month)?;
        validate_units(number_of_units)?;

        let now = self.clock.now();
        let params = BTreeMap::from([
            ("planType", plan_type.to_string()),
            ("numberOfUnits", number_of_units.to_string()),
            ("asOf", self.as_of(now)),
        ]);
        let key = cache::cache_key(year, month, "month", &params);

        let response = self
            .cached(&key, || async {
                let last_of_month = last_day_of_month(first_of_month);
                let (drivers, movers) = self.load_pools(first_of_month, last_of_month).await?;
                Ok(self
                    .aggregator
                    .monthly(plan_type, number_of_units, first_of_month, now, &drivers, &movers))
            })
            .await?;

        info!(
            plan_type = %plan_type,
            year,
            month,
            number_of_units,
            days = response.data.len(),
            cache_hit = response.metadata.cache_hit,
            query_time_ms = response.metadata.query_time_ms,
            "monthly availability"
        );
        Ok(response)
    }

    /// Every business-hour slot of one date with bookability
    pub async fn get_daily_time_slots(
        &self,
        plan_type: PlanType,
        date: &str,
        number_of_units: u32,
    ) -> Result<AvailabilityResponse<Vec<SlotAvailability>>> {
        let date = parse_date(date)?;
        validate_units(number_of_units)?;

        let now = self.clock.now();
        let params = BTreeMap::from([
            ("planType", plan_type.to_string()),
            ("numberOfUnits", number_of_units.to_string()),
            ("date", date.to_string()),
            ("asOf", self.as_of(now)),
        ]);
        let key = cache::cache_key(date.year(), date.month(), "date", &params);

        let response = self
            .cached(&key, || async {
                let (drivers, movers) = self.load_pools(date, date).await?;
                Ok(self
                    .aggregator
                    .daily(plan_type, number_of_units, date, now, &drivers, &movers))
            })
            .await?;

        info!(
            plan_type = %plan_type,
            %date,
            number_of_units,
            bookable = response.data.iter().filter(|s| s.bookable).count(),
            cache_hit = response.metadata.cache_hit,
            query_time_ms = response.metadata.query_time_ms,
            "daily time slots"
        );
        Ok(response)
    }

    /// Why each driver and mover can or cannot take the slot starting at
    /// `start_time` on `date`. Always computed fresh.
    pub async fn explain_slot(&self, date: &str, start_time: &str) -> Result<SlotDiagnosis> {
        let date = parse_date(date)?;
        time_string_to_minutes(start_time).map_err(|e| AvailabilityError::validation("time", e.to_string()))?;

        let slot = self
            .aggregator
            .slots(date)
            .into_iter()
            .find(|slot| slot.start_time == start_time)
            .ok_or_else(|| {
                AvailabilityError::validation("time", format!("{} is not a business-hour slot start", start_time))
            })?;

        let (drivers, movers) = self.load_pools(date, date).await?;
        Ok(self.aggregator.diagnose(slot, &drivers, &movers))
    }

    /// Invalidates cache entries an event could have made stale. Cache
    /// failures are logged and otherwise ignored.
    pub async fn handle_event(&self, event: AvailabilityEvent) -> usize {
        let prefix = match event.affected_date() {
            Some(date) => cache::month_prefix(date.year(), date.month()),
            None => KEY_ROOT.to_string(),
        };
        match self.cache.invalidate_prefix(&prefix).await {
            Ok(removed) => {
                info!(?event, %prefix, removed, "availability cache invalidated");
                removed
            }
            Err(e) => {
                warn!(?event, error = %e, "cache invalidation failed");
                0
            }
        }
    }

    pub async fn invalidate_all(&self) -> usize {
        self.handle_event(AvailabilityEvent::AvailabilityRulesChanged).await
    }

    async fn cached<T, F, Fut>(&self, key: &str, compute: F) -> Result<AvailabilityResponse<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();

        match cache::get_json::<T>(self.cache.as_ref(), key).await {
            Ok(Some(data)) => {
                debug!(%key, "availability cache hit");
                return Ok(AvailabilityResponse {
                    data,
                    metadata: QueryMetadata {
                        query_time_ms: elapsed_ms(started),
                        cache_hit: true,
                    },
                });
            }
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "cache read failed, computing uncached"),
        }

        // Taken before the fetch so an invalidation racing it voids the write
        let generation = match self.cache.generation(key).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(%key, error = %e, "cache generation unavailable, result will not be stored");
                None
            }
        };

        let data = compute().await?;

        if let Some(generation) = generation {
            match cache::set_json(self.cache.as_ref(), key, &data, self.config.cache_ttl, generation).await {
                Ok(true) => {}
                Ok(false) => debug!(%key, "invalidated while computing, result not stored"),
                Err(e) => warn!(%key, error = %e, "cache write failed"),
            }
        }

        Ok(AvailabilityResponse {
            data,
            metadata: QueryMetadata {
                query_time_ms: elapsed_ms(started),
                cache_hit: false,
            },
        })
    }

    async fn load_pools(&self, from: NaiveDate, to: NaiveDate) -> Result<(ResourcePool, ResourcePool)> {
        let snapshot = self.fetch_snapshot(from, to).await?;
        let drivers = ResourcePool::from_snapshot(ResourceKind::Driver, &snapshot.drivers)?;
        let movers = ResourcePool::from_snapshot(ResourceKind::Mover, &snapshot.movers)?;
        Ok((drivers, movers))
    }

    /// Six independent reads for the dates `from..=to`. The commitment range
    /// is widened by the buffers so windows spilling across midnight count.
    async fn fetch_snapshot(&self, from: NaiveDate, to: NaiveDate) -> Result<Snapshot> {
        // Pad the commitment range by the buffers
        let buffers = self.config.buffers;
        let day_after = to.succ_opt().unwrap_or(to);
        let window_start = local_midnight(from, self.timezone())
            - Duration::minutes(i64::from(buffers.service_minutes + buffers.after_minutes));
        let window_end = local_midnight(day_after, self.timezone()) + Duration::minutes(i64::from(buffers.before_minutes));

        // All six reads in flight at once
        let store = self.store.as_ref();
        let fetched = tokio::try_join!(
            store.availability_windows(ResourceKind::Driver),
            store.availability_windows(ResourceKind::Mover),
            store.blocked_dates(ResourceKind::Driver, from, to),
            store.blocked_dates(ResourceKind::Mover, from, to),
            store.commitments(ResourceKind::Driver, window_start, window_end),
            store.commitments(ResourceKind::Mover, window_start, window_end),
        );

        let (driver_windows, mover_windows, driver_blocked, mover_blocked, driver_tasks, mover_bookings) =
            fetched.map_err(|e| {
                error!(error = %e, %from, %to, "availability snapshot fetch failed");
                AvailabilityError::from(e)
            })?;

        debug!(
            driver_windows = driver_windows.len(),
            mover_windows = mover_windows.len(),
            commitments = driver_tasks.len() + mover_bookings.len(),
            "availability snapshot fetched"
        );

        // Group per pool
        Ok(Snapshot {
            drivers: PoolSnapshot {
                windows: driver_windows,
                blocked_dates: driver_blocked,
                commitments: driver_tasks,
            },
            movers: PoolSnapshot {
                windows: mover_windows,
                blocked_dates: mover_blocked,
                commitments: mover_bookings,
            },
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn local_midnight(date: NaiveDate, timezone: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn last_day_of_month(first_of_month: NaiveDate) -> NaiveDate {
    let month = first_of_month.month();
    first_of_month
        .iter_days()
        .take_while(|d| d.month() == month)
        .last()
        .unwrap_or(first_of_month)
}

pub fn validate_year_month(year: i32, month: u32) -> Result<NaiveDate> {
    if !(1000..=9999).contains(&year) {
        return Err(AvailabilityError::validation("year", "must be a 4-digit year"));
    }
    if !(1..=12).contains(&month) {
        return Err(AvailabilityError::validation("month", "must be between 1 and 12"));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AvailabilityError::validation("month", format!("{}-{:02} is not a valid month", year, month)))
}

pub fn validate_units(number_of_units: u32) -> Result<()> {
    if number_of_units == 0 {
        return Err(AvailabilityError::validation("numberOfUnits", "must be a positive integer"));
    }
    Ok(())
}

/// Strict `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.len() != 10 {
        return Err(AvailabilityError::validation("date", format!("'{}' is not YYYY-MM-DD", raw)));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|e| AvailabilityError::validation("date", format!("'{}' is not a valid date: {}", raw, e)))
}
