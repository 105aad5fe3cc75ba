//! Worker scripts and sample jobs shared by the pool test suites

use shared::{OptimizeJob, Tier};

/// Standard test data and fixtures
pub struct TestFixtures;

#[allow(dead_code)]
impl TestFixtures {
    /// Answers every request, echoing the job's email plus its own pid and request count
    ///
    /// `WORKER_DELAY` (seconds) delays each answer.
    pub const ECHO_WORKER: &'static str = r##"
n=0
while IFS= read -r line; do
  n=$((n+1))
  id=${line#*\"id\":\"}; id=${id%%\"*}
  email=${line#*\"email\":\"}; email=${email%%\"*}
  sleep "${WORKER_DELAY:-0}"
  printf '{"id":"%s","status":"success","result":{"optimizedCV":"<p>%s</p>","atsScore":75,"email":"%s","worker":%s,"served":%s}}\n' "$id" "$email" "$email" "$$" "$n"
done
"##;

    /// Like `ECHO_WORKER`, but the first answer arrives `WORKER_DELAY` seconds late
    pub const SLOW_FIRST_WORKER: &'static str = r##"
n=0
while IFS= read -r line; do
  n=$((n+1))
  id=${line#*\"id\":\"}; id=${id%%\"*}
  email=${line#*\"email\":\"}; email=${email%%\"*}
  if [ "$n" -eq 1 ]; then sleep "${WORKER_DELAY:-1}"; fi
  printf '{"id":"%s","status":"success","result":{"optimizedCV":"<p>%s</p>","atsScore":75,"email":"%s","worker":%s,"served":%s}}\n' "$id" "$email" "$email" "$$" "$n"
done
"##;

    /// Writes each answer in pieces, preceded by a stray log line
    pub const FRAGMENTED_WORKER: &'static str = r##"
while IFS= read -r line; do
  id=${line#*\"id\":\"}; id=${id%%\"*}
  echo "loading model..."
  printf '{"id":"%s","status":"succ' "$id"
  sleep 0.1
  printf 'ess","result":{"optimizedCV":"<p>fragmented</p>"'
  sleep 0.1
  printf ',"atsScore":90}}\n'
done
"##;

    /// Reports a processing error for every request
    pub const ERROR_WORKER: &'static str = r##"
while IFS= read -r line; do
  id=${line#*\"id\":\"}; id=${id%%\"*}
  printf '{"id":"%s","status":"error","error":"model failed"}\n' "$id"
done
"##;

    /// Dies on the first request
    pub const CRASH_WORKER: &'static str = r##"
IFS= read -r line
echo "Traceback: worker exploded" >&2
exit 3
"##;

    /// Reads requests and never answers
    pub const SILENT_WORKER: &'static str = r##"
while IFS= read -r line; do
  :
done
"##;

    /// CLI stand-in writing artifacts that reflect its arguments
    pub const ARTIFACT_CLI: &'static str = r##"
out=""; job=""; plan=""; template=""; lang=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift 2 ;;
    --job) job="$2"; shift 2 ;;
    --plan) plan="$2"; shift 2 ;;
    --template) template="$2"; shift 2 ;;
    --lang) lang="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -n "$job" ]; then cat "$job" > "$out/optimized_cv.html"; else printf '<h1>Optimized</h1>' > "$out/optimized_cv.html"; fi
printf '["%s","%s","%s"]' "$plan" "$template" "$lang" > "$out/improvements.json"
printf '{"ats_score": 91, "subscores": {"keywords": 8}}' > "$out/report.json"
printf '["Dodaj certyfikaty"]' > "$out/suggestions.json"
"##;

    /// CLI stand-in that exits cleanly without writing anything
    pub const EMPTY_CLI: &'static str = "exit 0";

    /// CLI stand-in that fails
    pub const FAILING_CLI: &'static str = r##"
echo "Traceback: ModuleNotFoundError: cvperfect_py" >&2
exit 2
"##;

    /// CLI stand-in that hangs
    pub const HANGING_CLI: &'static str = "sleep 30";

    pub const CV_TEXT: &'static str = "Jan Kowalski\nSenior Rust Developer\nDoświadczenie: 8 lat";

    pub fn job(email: &str) -> OptimizeJob {
        OptimizeJob::new(Self::CV_TEXT, email)
    }

    pub fn job_for(tier: Tier, n: usize) -> OptimizeJob {
        OptimizeJob::new(Self::CV_TEXT, format!("user{n}@example.com")).with_plan(tier)
    }
}
