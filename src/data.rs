pub mod attributes;
pub mod combine;
pub mod normalize;
pub mod rows;
pub mod timeline;

pub use attributes::{attribute_names, select_attribute_names};
pub use combine::{combine_files, CombinedLines};
pub use normalize::{normalize_file, normalized_path, ColumnRanges};
pub use rows::{CsvSource, Row, RowSource, RowStream};
pub use timeline::{timeline, TimeDataGroup, TimeSpan, TimelineRequest};
