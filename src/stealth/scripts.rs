//! Evasion scripts, injected on every new document.
//!
//! Order matters: navigator basics first (the cheapest checks bots fail),
//! then hardware and rendering fingerprints. Scripts read the per-session
//! `window.__ppConfig` object injected before any of them run.

/// `(name, source)` pairs in injection order.
pub const EVASION_SCRIPTS: &[(&str, &str)] = &[
    ("navigator_webdriver", NAVIGATOR_WEBDRIVER),
    ("navigator_platform", NAVIGATOR_PLATFORM),
    ("navigator_languages", NAVIGATOR_LANGUAGES),
    ("navigator_plugins", NAVIGATOR_PLUGINS),
    ("navigator_permissions", NAVIGATOR_PERMISSIONS),
    ("hardware_concurrency", HARDWARE_CONCURRENCY),
    ("screen_metrics", SCREEN_METRICS),
    ("webgl_vendor", WEBGL_VENDOR),
    ("canvas_noise", CANVAS_NOISE),
    ("chrome_runtime", CHROME_RUNTIME),
];

const NAVIGATOR_WEBDRIVER: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
";

const NAVIGATOR_PLATFORM: &str = r"
if (window.__ppConfig && window.__ppConfig.platform) {
    Object.defineProperty(navigator, 'platform', {
        get: () => window.__ppConfig.platform
    });
}
";

const NAVIGATOR_LANGUAGES: &str = r"
if (window.__ppConfig) {
    Object.defineProperty(navigator, 'language', {
        get: () => window.__ppConfig.language
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => window.__ppConfig.languages
    });
}
";

const NAVIGATOR_PLUGINS: &str = r"
(() => {
    const mockPlugins = [
        {
            name: 'Chrome PDF Plugin',
            description: 'Portable Document Format',
            filename: 'internal-pdf-viewer'
        },
        {
            name: 'Chrome PDF Viewer',
            description: '',
            filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai'
        },
        {
            name: 'Native Client',
            description: '',
            filename: 'internal-nacl-plugin'
        }
    ];
    const pluginsProto = Object.getPrototypeOf(navigator.plugins);
    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const plugins = {};
            mockPlugins.forEach((plugin, i) => {
                plugins[i] = plugin;
                plugins[plugin.name] = plugin;
            });
            Object.setPrototypeOf(plugins, pluginsProto);
            Object.defineProperty(plugins, 'length', { value: mockPlugins.length });
            return plugins;
        }
    });
})();
";

const NAVIGATOR_PERMISSIONS: &str = r"
(() => {
    if (!navigator.permissions || !navigator.permissions.query) return;
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) => {
        if (parameters && parameters.name === 'notifications') {
            return Promise.resolve({ state: Notification.permission });
        }
        return originalQuery(parameters);
    };
})();
";

const HARDWARE_CONCURRENCY: &str = r"
if (window.__ppConfig && window.__ppConfig.hardwareConcurrency) {
    Object.defineProperty(navigator, 'hardwareConcurrency', {
        get: () => window.__ppConfig.hardwareConcurrency
    });
}
";

const SCREEN_METRICS: &str = r"
if (window.__ppConfig && window.__ppConfig.screenWidth) {
    Object.defineProperty(screen, 'width', { get: () => window.__ppConfig.screenWidth });
    Object.defineProperty(screen, 'height', { get: () => window.__ppConfig.screenHeight });
    Object.defineProperty(screen, 'availWidth', { get: () => window.__ppConfig.screenWidth });
    Object.defineProperty(screen, 'availHeight', { get: () => window.__ppConfig.screenHeight - 40 });
}
";

const WEBGL_VENDOR: &str = r"
(() => {
    const config = window.__ppConfig || {};
    const getParameterProxyHandler = {
        apply: function(target, ctx, args) {
            const param = (args && args[0]) || null;
            // UNMASKED_VENDOR_WEBGL
            if (param === 37445) return config.webglVendor || 'Intel Inc.';
            // UNMASKED_RENDERER_WEBGL
            if (param === 37446) return config.webglRenderer || 'Intel(R) UHD Graphics';
            return Reflect.apply(target, ctx, args);
        }
    };
    if (window.WebGLRenderingContext) {
        const getParameter = WebGLRenderingContext.prototype.getParameter;
        WebGLRenderingContext.prototype.getParameter = new Proxy(getParameter, getParameterProxyHandler);
    }
    if (window.WebGL2RenderingContext) {
        const getParameter2 = WebGL2RenderingContext.prototype.getParameter;
        WebGL2RenderingContext.prototype.getParameter = new Proxy(getParameter2, getParameterProxyHandler);
    }
})();
";

// Deterministic per-session noise: the seed comes from __ppConfig, so repeat
// reads within a session agree while sessions differ from each other.
const CANVAS_NOISE: &str = r"
(() => {
    const seed = (window.__ppConfig && window.__ppConfig.sessionSeed) || '00';
    let state = 0;
    for (let i = 0; i < seed.length; i++) {
        state = ((state << 5) - state + seed.charCodeAt(i)) | 0;
    }
    const nextNoise = () => {
        state = (state * 1103515245 + 12345) & 0x7fffffff;
        return (state % 3) - 1;
    };
    const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function(...args) {
        const ctx = this.getContext('2d');
        if (ctx && this.width > 0 && this.height > 0) {
            try {
                const imageData = ctx.getImageData(0, 0, this.width, this.height);
                for (let i = 0; i < imageData.data.length; i += 997) {
                    imageData.data[i] = Math.max(0, Math.min(255, imageData.data[i] + nextNoise()));
                }
                ctx.putImageData(imageData, 0, 0);
            } catch (e) { /* tainted canvas */ }
        }
        return originalToDataURL.apply(this, args);
    };
})();
";

const CHROME_RUNTIME: &str = r"
if (!window.chrome) {
    window.chrome = {};
}
if (!window.chrome.runtime) {
    window.chrome.runtime = {
        connect: () => ({
            onMessage: { addListener: () => {}, removeListener: () => {} },
            postMessage: () => {},
            disconnect: () => {}
        })
    };
}
";
