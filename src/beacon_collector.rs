//! Data collectors sampling entity metrics after every engine step

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::beacon_interface::{EntityId, EntityKind, Tick};
use crate::beacon_scheduler::{Entity, Scheduler};

/// Receives the scheduler once per step, after all entities have advanced
pub trait DataCollector {
    fn collect(&mut self, tick: Tick, scheduler: &Scheduler);
}

/// Discards every sample
pub struct NoOpCollector;

impl DataCollector for NoOpCollector {
    fn collect(&mut self, _tick: Tick, _scheduler: &Scheduler) {}
}

/// One entity's ownership distribution at one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub tick: Tick,
    pub entity: EntityId,
    pub kind: EntityKind,
    pub distribution: Vec<usize>,
}

impl OwnershipRecord {
    fn from_entity(tick: Tick, entity: &Entity) -> Self {
        Self {
            tick,
            entity: entity.id(),
            kind: entity.kind(),
            distribution: entity.ownership_distribution().to_vec(),
        }
    }

    /// Largest single-owner share of seats, 0.0 when the entity holds none
    pub fn max_share(&self) -> f64 {
        let seats: usize = self.distribution.iter().sum();
        match self.distribution.first() {
            Some(&largest) if seats > 0 => largest as f64 / seats as f64,
            _ => 0.0,
        }
    }
}

// ============================================================================
// Console Logging Collector
// ============================================================================

/// Logs each group's ownership distribution through `log::info!`
pub struct ConsoleCollector {
    enabled: bool,
    logged: usize,
}

impl ConsoleCollector {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, logged: 0 }
    }

    /// Lines emitted so far
    pub fn logged(&self) -> usize {
        self.logged
    }

    // Format: tick group_entity seats max_share distribution
    fn format_line(record: &OwnershipRecord) -> String {
        format!(
            "{:>5} {:>6} seats:{:<4} max_share:{:.3} dist:{:?}",
            record.tick,
            record.entity,
            record.distribution.iter().sum::<usize>(),
            record.max_share(),
            record.distribution
        )
    }
}

impl DataCollector for ConsoleCollector {
    fn collect(&mut self, tick: Tick, scheduler: &Scheduler) {
        if !self.enabled {
            return;
        }

        for entity in scheduler.iter().filter(|e| e.kind() == EntityKind::Group) {
            let record = OwnershipRecord::from_entity(tick, entity);
            log::info!("{}", Self::format_line(&record));
            self.logged += 1;
        }
    }
}

// ============================================================================
// CSV Collector
// ============================================================================

/// Streams samples to a CSV file
pub struct CsvCollector {
    writer: BufWriter<File>,
}

impl CsvCollector {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "tick,entity_id,kind,seats,owners,max_share,distribution")?;

        Ok(Self { writer })
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    fn write_record(&mut self, record: &OwnershipRecord) {
        let distribution: Vec<String> = record.distribution.iter().map(|s| s.to_string()).collect();
        let result = writeln!(
            self.writer,
            "{},{},{},{},{},{:.4},{}",
            record.tick,
            record.entity,
            record.kind.as_str(),
            record.distribution.iter().sum::<usize>(),
            record.distribution.len(),
            record.max_share(),
            distribution.join(" ")
        );

        if let Err(e) = result {
            log::error!("error writing ownership sample to CSV: {}", e);
        }
    }
}

impl DataCollector for CsvCollector {
    fn collect(&mut self, tick: Tick, scheduler: &Scheduler) {
        for entity in scheduler.iter() {
            self.write_record(&OwnershipRecord::from_entity(tick, entity));
        }
    }
}

impl Drop for CsvCollector {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Memory Collector
// ============================================================================

/// Keeps every sample in memory for programmatic analysis
#[derive(Debug, Default)]
pub struct MemoryCollector {
    records: Vec<OwnershipRecord>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[OwnershipRecord] {
        &self.records
    }

    pub fn for_tick(&self, tick: Tick) -> impl Iterator<Item = &OwnershipRecord> {
        self.records.iter().filter(move |r| r.tick == tick)
    }

    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &OwnershipRecord> {
        self.records.iter().filter(move |r| r.entity == entity)
    }

    pub fn groups(&self) -> impl Iterator<Item = &OwnershipRecord> {
        self.records.iter().filter(|r| r.kind == EntityKind::Group)
    }

    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut csv = CsvCollector::new(path)?;
        for record in &self.records {
            csv.write_record(record);
        }
        csv.flush()
    }
}

impl DataCollector for MemoryCollector {
    fn collect(&mut self, tick: Tick, scheduler: &Scheduler) {
        self.records
            .extend(scheduler.iter().map(|entity| OwnershipRecord::from_entity(tick, entity)));
    }
}

// ============================================================================
// Multi Collector
// ============================================================================

/// Fans each sample out to several collectors
#[derive(Default)]
pub struct MultiCollector {
    collectors: Vec<Box<dyn DataCollector>>,
}

impl MultiCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collector(&mut self, collector: Box<dyn DataCollector>) {
        self.collectors.push(collector);
    }
}

impl DataCollector for MultiCollector {
    fn collect(&mut self, tick: Tick, scheduler: &Scheduler) {
        for collector in &mut self.collectors {
            collector.collect(tick, scheduler);
        }
    }
}
