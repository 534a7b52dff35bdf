//! An unbounded collector: every matching document's id-valued fast field,
//! with no top-K cutoff. Used when the caller didn't supply `max_hits`, so
//! scoring the hits would be wasted work.

use tantivy::collector::{Collector, SegmentCollector};
use tantivy::{DocId, Score, SegmentOrdinal, SegmentReader};

/// Collects every matching document's value for a single `u64` fast field.
pub struct FastFieldCollector {
    field_name: &'static str,
}

impl FastFieldCollector {
    /// Collects the value of `field_name` (must be a single-valued `u64`
    /// fast field) for every matching document.
    pub fn new(field_name: &'static str) -> Self {
        Self { field_name }
    }
}

impl Collector for FastFieldCollector {
    type Fruit = Vec<u64>;
    type Child = FastFieldSegmentCollector;

    fn for_segment(
        &self,
        _segment_local_id: SegmentOrdinal,
        reader: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        let column = reader.fast_fields().u64(self.field_name)?;
        Ok(FastFieldSegmentCollector { column, values: Vec::new() })
    }

    fn requires_scoring(&self) -> bool {
        false
    }

    fn merge_fruits(&self, segment_fruits: Vec<Self::Fruit>) -> tantivy::Result<Self::Fruit> {
        Ok(segment_fruits.into_iter().flatten().collect())
    }
}

/// Per-segment half of [`FastFieldCollector`].
pub struct FastFieldSegmentCollector {
    column: tantivy::columnar::Column<u64>,
    values: Vec<u64>,
}

impl SegmentCollector for FastFieldSegmentCollector {
    type Fruit = Vec<u64>;

    fn collect(&mut self, doc: DocId, _score: Score) {
        if let Some(value) = self.column.first(doc) {
            self.values.push(value);
        }
    }

    fn harvest(self) -> Self::Fruit {
        self.values
    }
}
