//! Course catalog models.
//!
//! The catalog is read-only to the progress engine: courses and modules are
//! authored elsewhere and consumed here for sequencing and aggregation.

use serde::{Deserialize, Serialize};
use crate::id::{CourseId, ModuleId};

/// Publication status of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    /// Being authored, not visible to trainees
    Draft,
    /// Live
    Published,
    /// Retired
    Archived,
}

/// A course: an ordered collection of modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier
    pub id: CourseId,

    /// Course title
    pub title: String,

    /// Course description
    pub description: String,

    /// Publication status
    pub status: CourseStatus,

    /// Whether the course is mandatory for assigned trainees
    pub is_mandatory: bool,

    /// Rough total duration, hours
    pub estimated_duration_hours: Option<u32>,
}

impl Course {
    /// Create a published course with a fresh id.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: CourseId::new(),
            title: title.into(),
            description: description.into(),
            status: CourseStatus::Published,
            is_mandatory: false,
            estimated_duration_hours: None,
        }
    }
}

/// Content type of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Video lesson
    Video,
    /// PDF document
    Pdf,
    /// Slide deck
    Ppt,
    /// Graded quiz
    Quiz,
}

/// A course content unit, ordered within its course by `sequence_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Unique identifier
    pub id: ModuleId,

    /// Owning course
    pub course_id: CourseId,

    /// Module title
    pub title: String,

    /// Content type
    pub kind: ModuleKind,

    /// Position within the course. Unique per course.
    pub sequence_order: u32,

    /// Mandatory modules gate everything that follows them
    pub is_mandatory: bool,

    /// Expected time to complete, minutes
    pub estimated_duration_minutes: u32,
}

impl Module {
    /// Create a module with a fresh id.
    pub fn new(
        course_id: CourseId,
        title: impl Into<String>,
        kind: ModuleKind,
        sequence_order: u32,
    ) -> Self {
        Self {
            id: ModuleId::new(),
            course_id,
            title: title.into(),
            kind,
            sequence_order,
            is_mandatory: true,
            estimated_duration_minutes: 0,
        }
    }
}
