//! Prompt templates.
//!
//! Templates use `{{slot}}` placeholders filled by [`fill`].

pub const EXTRACT_MICROSERVICES: &str = r#"You are a software architect who designs small, new microservice systems.
Extract the list of microservices needed to implement the specifications and user stories below.
Keep every microservice small and focused and use as few microservices as possible.

Answer with a JSON array only, one object per microservice:
[
  {"name": "name1", "description": "what the microservice does", "user_stories": ["1"]},
  {"name": "name2", "description": "what the microservice does", "user_stories": ["2", "3"]}
]

Specifications:
--------------------
{{specs}}
--------------------
User Stories:
--------------------
{{user_stories}}
--------------------

The microservice list is:
"#;

pub const FIND_CONTEXT: &str = "What are the best microservices patterns to use for this microservices list {{microservices_list}} given these user stories: {{user_stories}} and descriptions:{{specs}}?\n\
Only these patterns are allowed: communication style patterns (shared database, database per service) and data style patterns (api composition, cqrs, saga, aggregate, event sourcing, domain event). Do not use other patterns.";

pub const CITATION_QA: &str = "Please provide an answer based solely on the provided sources. \
When referencing information from a source, cite the appropriate User Story(ies) using their corresponding numbers. \
Every answer should include at least one source citation. \
Only cite a source when you are explicitly referencing it. \
If none of the sources are helpful, you should indicate that. \n\
------\n\
{{context_str}}\n\
------\n\
Query: {{query_str}}\n\
Answer: ";

pub const ASSIGN_ARCHITECTURE: &str = r#"Given a microservice list, text specifications and user stories of a software system,
use the retrieved context to choose the best implementation pattern for each microservice. Not every microservice needs a pattern.
Explain which source led to each choice.

For every microservice include:
- its name
- its endpoints with inputs, outputs and RESTful method
- its parameters (the state variables it manages)
- a description
- the numbers of the user stories it implements (every user story must be implemented by some microservice)

Only these implementation patterns are allowed: database-per-service, shared-database, api-composition, cqrs, saga, aggregate, event-sourcing, domain-event.
Keep patterns to the minimum needed for a coherent architecture. Microservices may be grouped under one pattern.
Every microservice or pattern group should have an associated datastore; describe each datastore and the user stories that motivated it.

Output JSON only, shaped like this:
{
  "microservices": [
    {
      "name": "login_service",
      "endpoints": [
        {"name": "/login", "method": "POST", "inputs": ["email", "password"], "outputs": ["login result"], "description": "authenticates a user"}
      ],
      "parameters": ["email", "password"],
      "description": "description of the microservice",
      "user_stories": ["2", "3"]
    }
  ],
  "patterns": [
    {"group_name": "meaningful name", "implementation_pattern": "saga", "involved_microservices": ["name1", "name2"], "explanation": "I chose this pattern because..."}
  ],
  "datastore": [
    {"datastore_name": "meaningful name", "associated_microservices": ["name1"], "description": "desc"}
  ]
}

Retrieved Context
--------------------
{{context}}
--------------------

Microservice List
--------------------
{{microservice_list}}
--------------------

Specifications:
--------------------
{{specs}}
--------------------

User Stories:
--------------------
{{user_stories}}
--------------------

The output json is:
"#;

pub const GENERATE_MICROSERVICE_CODE: &str = r#"You are a code generator. Turn the microservice description below into one plain-text document holding a complete Java 17 / Spring Boot 3 project.

Represent every file exactly like this, blocks directly one after another:

<relative/path/to/file>
----------------------------------------
```<language>
<full file content>
```

Rules:
- Put the project under `<service-slug>-service/` with a `pom.xml`, an `<Name>Application.java`, a controller, request and response DTOs per endpoint, domain entities, repositories, a service class and `src/main/resources/application.yml`.
- Use Spring Data JPA with H2, request validation, and Spring Security with JWT when an endpoint deals with authentication.
- Keep endpoint paths and methods exactly as given.
- Write full file contents: no ellipses, no placeholders, no text outside the file blocks.

The input is {{microservice}}
"#;

pub const UPDATE_PLAN_SCHEMA: &str = r#"You must output ONLY a single JSON object (no markdown, no pre/post text) matching this schema:

{
  "version": "1",
  "actions": [
    {"op":"mkdir","path":"<relative_dir>"},
    {"op":"write","path":"<relative_file>","content":"<text or base64>","encoding":"utf-8","if_exists":"overwrite"},
    {"op":"append","path":"<relative_file>","content":"<text or base64>","encoding":"utf-8"},
    {"op":"move","from":"<relative_old>","to":"<relative_new>","if_exists":"overwrite"},
    {"op":"delete","path":"<relative_path>","recursive":true}
  ],
  "notes":"Optional short notes"
}

Rules:
- Paths must be RELATIVE to the project root and MUST NOT contain '..'.
- Prefer 'write' with full contents over patches.
- For binary content, set "encoding": "base64".
- Keep files reasonably small; split artifacts if needed.
- Do not wrap the JSON in backticks or explanations. Output the JSON only."#;

pub const UPDATE_PATTERNS: &str = "You are updating a microservices project with cross-cutting PATTERNS.\n\
Project documents (truncated):\n{{project_documents}}\n\n\
Patterns to implement:\n{{patterns}}\n\n\
Focus only on API Gateway, CQRS, Saga and Event Sourcing patterns.\n\n\
{{update_plan_schema}}\n\
Return ONLY the JSON object.";

pub const UPDATE_DATASTORE: &str = r#"You are updating a microservices project to implement and wire DATASTORES.

### Context (truncated)
{{project_documents}}

### Datastore Spec
These are the datastores to create, configure and integrate:
{{datastore_spec}}

### Output Format
{{update_plan_schema}}

Guidelines:
- Create schemas, migrations, configuration, connection clients, environment variables and service-specific adapters.
- Update imports and wiring so that services actually use the new datastore modules.
- Keep paths RELATIVE to the project root and never use '..'.
- Output ONLY the JSON object."#;

pub const UPDATE_FRONTEND: &str = r#"You are adding a SMALL TEST FRONTEND to exercise the microservices.

### Goal
Create a minimal Vite + React + TypeScript app under `frontend/` for manually testing the key endpoints of each service.

### Requirements
- A small router or tab layout with one page per service area, basic loading and error states.
- A shared API client reading its base URL from `VITE_API_BASE_URL`, plus `.env.example`.
- `package.json` with `dev`, `build` and `preview` scripts, and `index.html`.
- `frontend/Dockerfile` building the app and serving it statically, and a `frontend` service in the root `docker-compose.yml`.
- Keep paths RELATIVE; never use '..'. Prefer full 'write' operations.

### Context (truncated)
{{project_documents}}

### Output Format
{{update_plan_schema}}

Output ONLY the JSON object."#;

pub const UPDATE_COMPOSE: &str = r#"You are Dockerizing a microservices project. Produce a JSON update plan (ONLY) that adds:
- a root docker-compose.yml wiring ALL services and the infrastructure they need (databases, brokers);
- a Dockerfile next to each service;
- a .env.example and any scripts needed to run locally.

### Context (truncated)
{{project_documents}}

### Requirements
- Compose v2 schema with networks, volumes, healthchecks and depends_on conditions.
- Expose only the ports that are needed and avoid collisions.
- Use ${VAR} references with defaults in .env.example.
- Keep paths RELATIVE to the repo root; never use '..'.
- For binary content set "encoding": "base64".

### Output Format
{{update_plan_schema}}"#;

/// Replace each `{{name}}` slot with its value in one pass over the
/// template. Values are copied verbatim, so slot syntax inside a value is
/// never expanded. Unknown slots are left as they are.
pub fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let name = &after[..end];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
