/// Router Module Index
///
/// Routes grouped by who may reach them. The groups only organize the code: access is
/// enforced for every route by `access::authorize` from the `access::ROUTE_ACCESS` table.

/// Routes open to anyone (pages, login/logout, stored files).
pub mod public;

/// Routes for teachers: uploads and question authoring.
pub mod teacher;

/// Routes for students: reading material, quizzes, grades and enrollment.
pub mod student;
