use crate::models::Page;
use crate::routes::RouteDescriptor;

/// Admin Route Family
///
/// The management screens (CRUD over the portal's reference data). Only a
/// session holding the admin role renders these; no allow-list is consulted.
///
/// Access Control:
/// A non-admin session is redirected to its role's home path. An anonymous
/// visitor is redirected to the anonymous home path (`/schedule`), which in
/// turn sends them to the login page.
pub fn routes() -> Vec<RouteDescriptor> {
    vec![
        // Accounts and role assignment.
        RouteDescriptor::admin_only("/management/user", Page::User),
        // Rooms, their capacity and opening hours.
        RouteDescriptor::admin_only("/management/lab", Page::Lab),
        // Workstations and instruments, each bound to a lab.
        RouteDescriptor::admin_only("/management/device", Page::Device),
        // Installed software catalogue per device.
        RouteDescriptor::admin_only("/management/software", Page::Software),
        // Manuals and regulations.
        RouteDescriptor::admin_only("/management/document", Page::Document),
        RouteDescriptor::admin_only("/management/class", Page::Class),
        RouteDescriptor::admin_only("/management/department", Page::Department),
    ]
}
