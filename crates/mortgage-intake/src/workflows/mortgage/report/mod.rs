mod render;
pub mod views;

pub use render::{
    JsonReportRenderer, ReportArtifact, ReportError, ReportRenderer, TextReportRenderer,
};
pub use views::ReportView;
