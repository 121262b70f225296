use serde::Serialize;

use crate::models::{Course, RideStatus, Schedule};

/// Day progress of one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
    pub course_id: String,
    pub course_name: String,
    pub total: usize,
    /// Riders on board right now.
    pub boarded: usize,
    /// Riders dropped off; the course is done when this reaches `total`.
    pub finished: usize,
}

impl CourseProgress {
    pub fn not_started(&self) -> usize {
        self.total.saturating_sub(self.finished + self.boarded)
    }

    /// Finished share, rounded to a whole percent.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.finished as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// Progress per course, in course master order. Courses with nothing
/// scheduled are left out.
pub fn course_progress(courses: &[Course], schedules: &[Schedule]) -> Vec<CourseProgress> {
    courses
        .iter()
        .filter_map(|course| {
            let rides: Vec<&Schedule> = schedules
                .iter()
                .filter(|s| s.course_id.as_deref() == Some(course.id.as_str()))
                .collect();
            if rides.is_empty() {
                return None;
            }

            let count = |status: RideStatus| {
                rides.iter().filter(|s| s.status.as_ref() == Some(&status)).count()
            };
            Some(CourseProgress {
                course_id: course.id.clone(),
                course_name: course.name.clone(),
                total: rides.len(),
                boarded: count(RideStatus::Boarded),
                finished: count(RideStatus::Alighted),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride(course: &str, status: Option<RideStatus>) -> Schedule {
        Schedule {
            course_id: Some(course.to_string()),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_counts_per_course() {
        let courses = vec![
            Course { id: "C1".into(), name: "北コース".into(), ..Default::default() },
            Course { id: "C2".into(), name: "南コース".into(), ..Default::default() },
            Course { id: "C3".into(), name: "空".into(), ..Default::default() },
        ];
        let schedules = vec![
            ride("C1", Some(RideStatus::Alighted)),
            ride("C1", Some(RideStatus::Boarded)),
            ride("C1", Some(RideStatus::Absent)),
            ride("C1", None),
            ride("C2", Some(RideStatus::Alighted)),
        ];

        let progress = course_progress(&courses, &schedules);
        assert_eq!(progress.len(), 2);

        let north = &progress[0];
        assert_eq!((north.total, north.boarded, north.finished), (4, 1, 1));
        assert_eq!(north.not_started(), 2);
        assert_eq!(north.percent(), 25);

        assert_eq!(progress[1].percent(), 100);
    }
}
