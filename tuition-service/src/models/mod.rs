//! Domain models for tuition-service.

mod catalog;
mod faculty;
mod payment;
mod student;

pub use catalog::{
    CreateStandard, CreateSubject, FeeCell, FeeScheduleCell, FeeScheduleRow, SetFeeCell, Standard,
    Subject,
};
pub use faculty::{CreateFaculty, ExternalFaculty, FacultySummary, UpdateFaculty};
pub use payment::{
    FacultyPaymentRecord, PaymentMode, PaymentRecord, ReceiptRecord, RecordFacultyPayment,
    RecordPayment,
};
pub use student::{CreateStudent, Student, StudentDetails, StudentFeeDetails};
