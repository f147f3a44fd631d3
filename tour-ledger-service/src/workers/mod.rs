mod schedule;

pub use schedule::SalaryScheduleWorker;
