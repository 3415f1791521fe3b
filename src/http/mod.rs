//! HTTP building blocks: status-code response builders and MIME
//! detection for the bundled UI.

pub mod mime;
pub mod response;

pub use response::{
    build_204_response, build_400_response, build_404_response, build_405_response,
    build_413_response, build_500_response, build_html_response,
};
