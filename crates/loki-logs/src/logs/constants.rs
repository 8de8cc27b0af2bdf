// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Platform record type emitted once the runtime has finished an invocation.
///
/// A non-forced drain stops after the batch carrying it; anything queued
/// behind it belongs to the next invocation.
pub const RUNTIME_DONE: &str = "platform.runtimeDone";

/// Level assigned when no heuristic matches.
pub const DEFAULT_LEVEL: &str = "LOGS";

/// Value of the `job` label on every stream.
pub const JOB_LABEL: &str = "lambda";

/// Path appended to the configured Loki base URL.
pub const PUSH_PATH: &str = "/loki/api/v1/push";

/// Keywords scanned, in priority order, when a line carries no explicit level.
pub(crate) const LEVEL_KEYWORDS: [&str; 5] = ["fatal", "error", "warn", "info", "debug"];
