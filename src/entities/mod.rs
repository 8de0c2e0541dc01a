//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod class;
pub mod class_schedule;
pub mod class_session;
pub mod discount_code;
pub mod instructor;
pub mod payment;
pub mod reservation;
pub mod school;

// Re-export specific types to avoid conflicts
pub use class::{Column as ClassColumn, Entity as Class, Model as ClassModel};
pub use class_schedule::{
    Column as ClassScheduleColumn, Entity as ClassSchedule, Model as ClassScheduleModel,
};
pub use class_session::{
    Column as ClassSessionColumn, Entity as ClassSession, Model as ClassSessionModel,
};
pub use discount_code::{
    Column as DiscountCodeColumn, Entity as DiscountCode, Model as DiscountCodeModel,
};
pub use instructor::{
    Column as InstructorColumn, Entity as Instructor, Model as InstructorModel,
};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use reservation::{
    Column as ReservationColumn, Entity as Reservation, Model as ReservationModel,
};
pub use school::{Column as SchoolColumn, Entity as School, Model as SchoolModel};
