use crate::models::{Page, Role};
use crate::routes::RouteDescriptor;

// Shared allow-lists.
const EVERY_ROLE: &[Role] = &[
    Role::Admin,
    Role::Instructor,
    Role::Hod,
    Role::TechnicalStaff,
    Role::Student,
    Role::User,
];
const TASK_HANDLERS: &[Role] = &[Role::Admin, Role::TechnicalStaff];
const REPORT_REVIEWERS: &[Role] = &[Role::Admin, Role::Hod, Role::TechnicalStaff];

/// Protected Route Family
///
/// Pages reachable by any **authenticated** session whose role is on the
/// descriptor's allow-list. Anonymous visitors are sent to the login page;
/// signed-in users without the role are sent to their home path, silently.
///
/// Every role's home path must appear here with that role allowed, otherwise
/// the redirect to "home" would bounce again.
pub fn routes() -> Vec<RouteDescriptor> {
    vec![
        // /dashboard
        // Admin landing page: lab occupancy, open tasks and pending reports.
        RouteDescriptor::protected("/dashboard", Page::Dashboard, &[Role::Admin]),
        // /task
        // Maintenance task board. Technical staff land here after sign-in.
        RouteDescriptor::protected("/task", Page::Task, TASK_HANDLERS),
        // /task-detail/:taskId
        RouteDescriptor::protected("/task-detail/:taskId", Page::TaskDetail, TASK_HANDLERS),
        // /schedule
        // Weekly lab calendar. Home path for instructors, HODs, students and plain users.
        RouteDescriptor::protected("/schedule", Page::Schedule, EVERY_ROLE),
        // /report
        // Device fault reports. Anyone signed in may file one.
        RouteDescriptor::protected("/report", Page::Report, EVERY_ROLE),
        // /report-detail/:reportId
        // Review view with approve/assign actions.
        RouteDescriptor::protected("/report-detail/:reportId", Page::ReportDetail, REPORT_REVIEWERS),
        // /profile
        RouteDescriptor::protected("/profile", Page::Profile, EVERY_ROLE),
    ]
}
