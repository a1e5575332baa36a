//! Subsection grades: computation, persistence and the per-request factory

mod factory;
mod record;
mod repository;
mod subsection;

pub use factory::{FactoryContext, PersistenceEnabled, SubsectionGradeFactory};
pub use record::{GradeParams, GradeRecord};
pub use repository::{GradeRepository, SqliteGradeRepository};
pub use subsection::{GradeState, GradingContext, SubsectionGrade, WeightedScore};
