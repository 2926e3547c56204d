//! Routing keys and topic-pattern matching.
//!
//! Keys are exactly three lowercase segments, `<service>.<aggregate>.<verb>`.
//! Binding patterns may use `*` (exactly one segment) and `#` (zero or more
//! segments), following AMQP topic-exchange rules.

pub const USER_CREATED: &str = "user.user.created";
pub const USER_UPDATED: &str = "user.user.updated";
pub const USER_DELETED: &str = "user.user.deleted";

pub const STUDENT_REGISTERED: &str = "auth.student.registered";
pub const USER_LOGGED_IN: &str = "auth.user.logged_in";
pub const USER_LOGGED_OUT: &str = "auth.user.logged_out";
pub const USER_FORGOT_PASSWORD: &str = "auth.user.forgot_password";
pub const USER_RESET_PASSWORD: &str = "auth.user.reset_password";
pub const USER_REQUESTED_EMAIL_VERIFICATION: &str = "auth.user.requested_email_verification";

pub const COURSE_CREATED: &str = "course.course.created";
pub const COURSE_UPDATED: &str = "course.course.updated";
pub const COURSE_DELETED: &str = "course.course.deleted";
pub const OFFERING_CREATED: &str = "course.offering.created";
pub const OFFERING_UPDATED: &str = "course.offering.updated";
pub const OFFERING_DELETED: &str = "course.offering.deleted";
pub const INSTRUCTOR_ASSIGNED: &str = "course.instructor.assigned";
pub const INSTRUCTOR_REMOVED: &str = "course.instructor.removed";
pub const SECTION_CREATED: &str = "course.section.created";
pub const SECTION_UPDATED: &str = "course.section.updated";
pub const SECTION_DELETED: &str = "course.section.deleted";
pub const MODULE_CREATED: &str = "course.module.created";
pub const MODULE_UPDATED: &str = "course.module.updated";
pub const MODULE_DELETED: &str = "course.module.deleted";

pub const ZOOM_MEETING_CREATED: &str = "zoom.meeting.created";

pub const ENROLLMENT_CREATED: &str = "enrollment.enrollment.created";
pub const ENROLLMENT_UPDATED: &str = "enrollment.enrollment.updated";
pub const ENROLLMENT_DELETED: &str = "enrollment.enrollment.deleted";

/// Every routing key the platform publishes.
pub const ALL: &[&str] = &[
    USER_CREATED,
    USER_UPDATED,
    USER_DELETED,
    STUDENT_REGISTERED,
    USER_LOGGED_IN,
    USER_LOGGED_OUT,
    USER_FORGOT_PASSWORD,
    USER_RESET_PASSWORD,
    USER_REQUESTED_EMAIL_VERIFICATION,
    COURSE_CREATED,
    COURSE_UPDATED,
    COURSE_DELETED,
    OFFERING_CREATED,
    OFFERING_UPDATED,
    OFFERING_DELETED,
    INSTRUCTOR_ASSIGNED,
    INSTRUCTOR_REMOVED,
    SECTION_CREATED,
    SECTION_UPDATED,
    SECTION_DELETED,
    MODULE_CREATED,
    MODULE_UPDATED,
    MODULE_DELETED,
    ZOOM_MEETING_CREATED,
    ENROLLMENT_CREATED,
    ENROLLMENT_UPDATED,
    ENROLLMENT_DELETED,
];

/// `true` when `key` has the `<service>.<aggregate>.<verb>` shape.
#[must_use]
pub fn is_valid_routing_key(key: &str) -> bool {
    let segments: Vec<&str> = key.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

/// Match a routing key against a binding pattern.
#[must_use]
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    matches_segments(&pattern, &key)
}

fn matches_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            // `#` absorbs zero or more segments.
            (0..=key.len()).any(|skip| key.get(skip..).is_some_and(|tail| matches_segments(rest, tail)))
        }
        Some((head, rest)) => match key.split_first() {
            Some((first, tail)) if *head == "*" || head == first => matches_segments(rest, tail),
            _ => false,
        },
    }
}
