#![forbid(unsafe_code)]

// ***************************************************************************
//                              Service Types
// ***************************************************************************
// ---------------------------------------------------------------------------
// Greeting:
// ---------------------------------------------------------------------------
/** The immutable value object produced for each request.  Constructed once
 * per request and dropped when the response has been written.
 */
#[derive(Debug, PartialEq, Eq)]
pub struct Greeting {
    message: String,
}

impl Greeting {
    fn new(message: String) -> Self {
        Self { message }
    }

    /// Consume the greeting and yield its message.
    pub fn into_message(self) -> String {
        self.message
    }

    #[allow(dead_code)]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// GreetingService:
// ---------------------------------------------------------------------------
/** Holds the optional salutation prefix read from configuration at startup.
 * The prefix never changes for the life of the process, so the service is
 * freely shareable across concurrent requests.
 */
pub struct GreetingService {
    greeting: Option<String>,
}

impl GreetingService {
    pub fn new(greeting: Option<String>) -> Self {
        Self { greeting }
    }

    // -----------------------------------------------------------------------
    // polite_hello:
    // -----------------------------------------------------------------------
    /** Build a greeting for the caller-supplied name.  When a prefix is
     * configured the message is "<prefix>, <name>"; otherwise the literal
     * fallback "hello<name>" is used.  Any string input, including the
     * empty string, produces a valid greeting.
     */
    pub fn polite_hello(&self, name: &str) -> Greeting {
        match &self.greeting {
            Some(prefix) => Greeting::new(format!("{}, {}", prefix, name)),
            None => Greeting::new(format!("hello{}", name)),
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::GreetingService;

    #[test]
    fn configured_prefix() {
        let svc = GreetingService::new(Some("Hello".to_string()));
        assert_eq!(svc.polite_hello("World").message(), "Hello, World");
    }

    #[test]
    fn fallback_prefix() {
        let svc = GreetingService::new(None);
        assert_eq!(svc.polite_hello("World").message(), "helloWorld");
    }

    #[test]
    fn name_preserved_verbatim() {
        // The message always ends with exactly the name that was passed in.
        let svc = GreetingService::new(Some("Bonjour".to_string()));
        for name in ["World", "bud", "O'Brien", "Mr/Mrs Smith", "名前"] {
            let msg = svc.polite_hello(name).into_message();
            assert!(msg.ends_with(name), "message {:?} does not end with {:?}", msg, name);
        }
    }

    #[test]
    fn empty_name() {
        let svc = GreetingService::new(Some("Hello".to_string()));
        assert_eq!(svc.polite_hello("").message(), "Hello, ");

        let svc = GreetingService::new(None);
        assert_eq!(svc.polite_hello("").message(), "hello");
    }

    #[test]
    fn idempotent() {
        let svc = GreetingService::new(Some("Hello".to_string()));
        let first = svc.polite_hello("World");
        let second = svc.polite_hello("World");
        assert_eq!(first, second);
    }
}
